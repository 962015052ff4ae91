//! User-login stage: commits the pending user into an authenticated session.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_AUTHENTICATED, CONTEXT_PENDING_USER, ContextPatch},
	stage::{Challenge, StageExecution, StageFuture, StageKind, StageOutcome},
};

/// Component discriminator for the user-login stage.
pub const COMPONENT_USER_LOGIN: &str = "ak-stage-user-login";

/// Stage implementation marking the plan as authenticated.
///
/// Expects a pending user resolved by an earlier stage; without one the flow
/// is denied, since nothing can be logged in.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserLoginStage;
impl StageKind for UserLoginStage {
	fn component(&self) -> &'static str {
		COMPONENT_USER_LOGIN
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move { Ok(Challenge::new(COMPONENT_USER_LOGIN, exec.flow_info.clone())) })
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		_input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let Some(user) = exec.context.get_str(CONTEXT_PENDING_USER) else {
				return Ok(StageOutcome::Redirect { to: None });
			};
			let patch = ContextPatch::new()
				.set(CONTEXT_AUTHENTICATED, json!(true))
				.set("user", json!(user));

			Ok(StageOutcome::Advance { patch })
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		context::{PlanContext, RequestContext},
		id::StageId,
		stage::{EmptyDirectory, FlowInfo, StageServices},
	};

	fn execution(context: PlanContext) -> StageExecution {
		StageExecution {
			stage: StageId::new("login").expect("Stage id fixture should be valid."),
			config: json!({}),
			request: RequestContext::anonymous(),
			context,
			flow_info: FlowInfo::default(),
			services: StageServices::new(Arc::new(EmptyDirectory)),
		}
	}

	#[tokio::test]
	async fn login_requires_a_pending_user() {
		let exec = execution(PlanContext::default());
		let outcome = UserLoginStage
			.process(&exec, &json!({}))
			.await
			.expect("User login should not fail.");

		assert!(matches!(outcome, StageOutcome::Redirect { .. }));
	}

	#[tokio::test]
	async fn login_patches_the_authenticated_flag() {
		let mut context = PlanContext::default();
		let stage = StageId::new("ident").expect("Stage id fixture should be valid.");

		context
			.apply_patch(&stage, ContextPatch::new().set(CONTEXT_PENDING_USER, json!("alice")));

		let exec = execution(context);
		let outcome = UserLoginStage
			.process(&exec, &json!({}))
			.await
			.expect("User login should not fail.");
		let StageOutcome::Advance { patch } = outcome else {
			panic!("Login with a pending user should advance.");
		};

		assert!(patch.keys().contains(&CONTEXT_AUTHENTICATED.to_string()));
	}
}
