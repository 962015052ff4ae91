//! Identification stage: resolves a pending user from a submitted identifier.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_PENDING_USER, ContextPatch},
	stage::{Challenge, StageExecution, StageFuture, StageKind, StageOutcome, parse_input},
};

/// Component discriminator for the identification stage.
pub const COMPONENT_IDENTIFICATION: &str = "ak-stage-identification";

/// Context key carrying the raw identifier the user typed.
pub const CONTEXT_PENDING_USER_IDENTIFIER: &str = "pending_user_identifier";

fn default_user_fields() -> Vec<String> {
	vec!["username".into()]
}

/// Identification stage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
	/// Directory fields matched against the submitted identifier.
	pub user_fields: Vec<String>,
	/// Continue with only the raw identifier when no user matches, so a later
	/// password stage fails verification instead of leaking user existence.
	pub pretend_user_exists: bool,
}
impl Default for IdentificationConfig {
	fn default() -> Self {
		Self { user_fields: default_user_fields(), pretend_user_exists: false }
	}
}

#[derive(Debug, Deserialize)]
struct IdentificationInput {
	uid_field: String,
}

/// Stage implementation resolving the flow's pending user.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentificationStage;
impl StageKind for IdentificationStage {
	fn component(&self) -> &'static str {
		COMPONENT_IDENTIFICATION
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			let config: IdentificationConfig = exec.config_as()?;

			Ok(Challenge::new(COMPONENT_IDENTIFICATION, exec.flow_info.clone())
				.with_payload(json!({ "user_fields": config.user_fields })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let config: IdentificationConfig = exec.config_as()?;
			let input: IdentificationInput = match parse_input(input) {
				Ok(input) => input,
				Err(errors) => return Ok(StageOutcome::Retry { errors, patch: ContextPatch::new() }),
			};
			let identifier = input.uid_field.trim();

			if identifier.is_empty() {
				return Ok(StageOutcome::retry_message("Failed to authenticate."));
			}

			let user = exec
				.services
				.directory
				.find_user(&config.user_fields, identifier)
				.await?;

			match user {
				Some(user) => {
					let patch = ContextPatch::new()
						.set(CONTEXT_PENDING_USER, json!(user.reference.as_ref()))
						.set(CONTEXT_PENDING_USER_IDENTIFIER, json!(identifier));

					Ok(StageOutcome::Advance { patch })
				},
				None if config.pretend_user_exists => {
					let patch =
						ContextPatch::new().set(CONTEXT_PENDING_USER_IDENTIFIER, json!(identifier));

					Ok(StageOutcome::Advance { patch })
				},
				None => Ok(StageOutcome::retry_message("Failed to authenticate.")),
			}
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

	fn execution(config: Value, directory: MemoryDirectory) -> StageExecution {
		StageExecution {
			stage: StageId::new("ident").expect("Stage id fixture should be valid."),
			config,
			request: RequestContext::anonymous(),
			context: PlanContext::default(),
			flow_info: FlowInfo::default(),
			services: StageServices::new(Arc::new(directory)),
		}
	}

	#[tokio::test]
	async fn known_identifier_advances_with_pending_user() {
		let directory = MemoryDirectory::default();

		directory.add_user("alice", None, None, "hunter2").expect("Fixture should be valid.");

		let exec = execution(json!({}), directory);
		let outcome = IdentificationStage
			.process(&exec, &json!({ "uid_field": "alice" }))
			.await
			.expect("Identification should not fail.");
		let StageOutcome::Advance { patch } = outcome else {
			panic!("Known identifier should advance.");
		};

		assert!(patch.keys().contains(&CONTEXT_PENDING_USER.to_string()));
	}

	#[tokio::test]
	async fn unknown_identifier_retries_with_a_generic_message() {
		let exec = execution(json!({}), MemoryDirectory::default());
		let outcome = IdentificationStage
			.process(&exec, &json!({ "uid_field": "nobody" }))
			.await
			.expect("Identification should not fail.");

		assert!(matches!(outcome, StageOutcome::Retry { .. }));
	}

	#[tokio::test]
	async fn pretend_user_exists_advances_without_a_match() {
		let exec = execution(json!({ "pretend_user_exists": true }), MemoryDirectory::default());
		let outcome = IdentificationStage
			.process(&exec, &json!({ "uid_field": "nobody" }))
			.await
			.expect("Identification should not fail.");
		let StageOutcome::Advance { patch } = outcome else {
			panic!("Pretend mode should advance.");
		};

		assert!(!patch.keys().contains(&CONTEXT_PENDING_USER.to_string()));
	}

	#[tokio::test]
	async fn malformed_input_is_a_retry_not_a_crash() {
		let exec = execution(json!({}), MemoryDirectory::default());
		let outcome = IdentificationStage
			.process(&exec, &json!({ "uid_field": 42 }))
			.await
			.expect("Identification should not fail.");

		assert!(matches!(outcome, StageOutcome::Retry { .. }));
	}
}
