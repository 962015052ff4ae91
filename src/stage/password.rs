//! Password stage: verifies the pending user's credential.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_AUTH_ATTEMPTS, CONTEXT_PENDING_USER, ContextPatch},
	id::UserRef,
	stage::{
		Challenge, FieldError, ResponseErrors, StageExecution, StageFuture, StageKind,
		StageOutcome, parse_input,
	},
};

/// Component discriminator for the password stage.
pub const COMPONENT_PASSWORD: &str = "ak-stage-password";

/// Context key recording the method that authenticated the user.
pub const CONTEXT_AUTH_METHOD: &str = "auth_method";

fn default_failed_attempts() -> u32 {
	5
}

/// Password stage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
	/// Failed attempts tolerated before the stage denies the whole flow.
	pub failed_attempts_before_cancel: u32,
}
impl Default for PasswordConfig {
	fn default() -> Self {
		Self { failed_attempts_before_cancel: default_failed_attempts() }
	}
}

#[derive(Debug, Deserialize)]
struct PasswordInput {
	password: String,
}

/// Stage implementation checking the pending user's password.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordStage;
impl PasswordStage {
	fn pending_user(exec: &StageExecution) -> Option<UserRef> {
		if let Some(raw) = exec.context.get_str(CONTEXT_PENDING_USER) {
			return UserRef::new(raw).ok();
		}

		exec.request.user.clone()
	}
}
impl StageKind for PasswordStage {
	fn component(&self) -> &'static str {
		COMPONENT_PASSWORD
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			Ok(Challenge::new(COMPONENT_PASSWORD, exec.flow_info.clone())
				.with_payload(json!({ "pending_user_known": Self::pending_user(exec).is_some() })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let config: PasswordConfig = exec.config_as()?;
			let input: PasswordInput = match parse_input(input) {
				Ok(input) => input,
				Err(errors) => return Ok(StageOutcome::Retry { errors, patch: ContextPatch::new() }),
			};
			let verified = match Self::pending_user(exec) {
				Some(user) =>
					exec.services.directory.verify_password(&user, &input.password).await?,
				// No pending user: fail like a wrong password to avoid leaking
				// whether the earlier identifier matched anything.
				None => false,
			};

			if verified {
				return Ok(StageOutcome::Advance {
					patch: ContextPatch::new().set(CONTEXT_AUTH_METHOD, json!("password")),
				});
			}

			let attempts = exec
				.context
				.get(CONTEXT_AUTH_ATTEMPTS)
				.and_then(Value::as_u64)
				.unwrap_or(0)
				.saturating_add(1);

			if attempts >= u64::from(config.failed_attempts_before_cancel) {
				return Ok(StageOutcome::Redirect { to: None });
			}

			let errors = ResponseErrors::from_iter([(
				"password".to_string(),
				vec![FieldError::invalid("Invalid password.")],
			)]);

			Ok(StageOutcome::Retry {
				errors,
				patch: ContextPatch::new().set(CONTEXT_AUTH_ATTEMPTS, json!(attempts)),
			})
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
		stage::{FlowInfo, MemoryDirectory, StageServices},
	};

	fn execution(directory: MemoryDirectory, context: PlanContext) -> StageExecution {
		StageExecution {
			stage: StageId::new("password").expect("Stage id fixture should be valid."),
			config: json!({}),
			request: RequestContext::anonymous(),
			context,
			flow_info: FlowInfo::default(),
			services: StageServices::new(Arc::new(directory)),
		}
	}

	fn context_with_pending(user: &str) -> PlanContext {
		let mut context = PlanContext::default();
		let stage = StageId::new("ident").expect("Stage id fixture should be valid.");

		context.apply_patch(&stage, ContextPatch::new().set(CONTEXT_PENDING_USER, json!(user)));

		context
	}

	#[tokio::test]
	async fn correct_password_advances() {
		let directory = MemoryDirectory::default();

		directory.add_user("alice", None, None, "hunter2").expect("Fixture should be valid.");

		let exec = execution(directory, context_with_pending("alice"));
		let outcome = PasswordStage
			.process(&exec, &json!({ "password": "hunter2" }))
			.await
			.expect("Password stage should not fail.");

		assert!(matches!(outcome, StageOutcome::Advance { .. }));
	}

	#[tokio::test]
	async fn wrong_password_retries_and_counts_attempts() {
		let directory = MemoryDirectory::default();

		directory.add_user("alice", None, None, "hunter2").expect("Fixture should be valid.");

		let exec = execution(directory, context_with_pending("alice"));
		let outcome = PasswordStage
			.process(&exec, &json!({ "password": "wrong" }))
			.await
			.expect("Password stage should not fail.");
		let StageOutcome::Retry { errors, patch } = outcome else {
			panic!("Wrong password should retry.");
		};

		assert!(errors.contains_key("password"));
		assert!(patch.keys().contains(&CONTEXT_AUTH_ATTEMPTS.to_string()));
	}

	#[tokio::test]
	async fn exceeding_the_attempt_limit_denies() {
		let directory = MemoryDirectory::default();

		directory.add_user("alice", None, None, "hunter2").expect("Fixture should be valid.");

		let mut context = context_with_pending("alice");
		let stage = StageId::new("password").expect("Stage id fixture should be valid.");

		context.apply_patch(&stage, ContextPatch::new().set(CONTEXT_AUTH_ATTEMPTS, json!(4)));

		let exec = execution(directory, context);
		let outcome = PasswordStage
			.process(&exec, &json!({ "password": "wrong" }))
			.await
			.expect("Password stage should not fail.");

		assert!(matches!(outcome, StageOutcome::Redirect { .. }));
	}

	#[tokio::test]
	async fn missing_pending_user_fails_like_a_wrong_password() {
		let exec = execution(MemoryDirectory::default(), PlanContext::default());
		let outcome = PasswordStage
			.process(&exec, &json!({ "password": "anything" }))
			.await
			.expect("Password stage should not fail.");

		assert!(matches!(outcome, StageOutcome::Retry { .. }));
	}
}
