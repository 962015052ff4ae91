//! Redirect stage: records a completion redirect target in the plan context.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	context::{CONTEXT_REDIRECT, ContextPatch},
	stage::{Challenge, StageExecution, StageFuture, StageKind, StageOutcome},
};

/// Component discriminator for the redirect stage.
pub const COMPONENT_REDIRECT: &str = "xak-flow-redirect";

/// Redirect stage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedirectConfig {
	/// Target the flow redirects to on completion.
	pub to: String,
}

/// Stage implementation that stores the redirect target and advances.
#[derive(Clone, Copy, Debug, Default)]
pub struct RedirectStage;
impl StageKind for RedirectStage {
	fn component(&self) -> &'static str {
		COMPONENT_REDIRECT
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			let config: RedirectConfig = exec.config_as()?;

			Ok(Challenge::new(COMPONENT_REDIRECT, exec.flow_info.clone())
				.with_payload(json!({ "to": config.to })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		_input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let config: RedirectConfig = exec.config_as()?;

			Ok(StageOutcome::Advance {
				patch: ContextPatch::new().set(CONTEXT_REDIRECT, json!(config.to)),
			})
		})
	}
}
