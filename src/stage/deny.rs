//! Deny stage: unconditional denial, also used as the synthetic denial terminal.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	stage::{Challenge, StageExecution, StageFuture, StageKind, StageOutcome},
};

/// Component discriminator for the access-denied stage.
pub const COMPONENT_ACCESS_DENIED: &str = "ak-stage-access-denied";

/// Deny stage configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DenyConfig {
	/// Message shown to the user; a generic one is used when unset.
	pub deny_message: Option<String>,
	/// Continue target exposed alongside the message, when the flow's denied
	/// action allows continuing.
	pub to: Option<String>,
}

/// Stage implementation that always denies.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyStage;
impl StageKind for DenyStage {
	fn component(&self) -> &'static str {
		COMPONENT_ACCESS_DENIED
	}

	fn challenge<'a>(&'a self, exec: &'a StageExecution) -> StageFuture<'a, Challenge> {
		Box::pin(async move {
			let config: DenyConfig = exec.config_as()?;
			let message =
				config.deny_message.unwrap_or_else(|| "Request has been denied.".to_string());

			Ok(Challenge::new(COMPONENT_ACCESS_DENIED, exec.flow_info.clone())
				.with_payload(json!({ "error_message": message, "to": config.to })))
		})
	}

	fn process<'a>(
		&'a self,
		exec: &'a StageExecution,
		_input: &'a Value,
	) -> StageFuture<'a, StageOutcome> {
		Box::pin(async move {
			let config: DenyConfig = exec.config_as()?;

			Ok(StageOutcome::Redirect { to: config.to })
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

	#[tokio::test]
	async fn deny_challenge_carries_the_configured_message() {
		let exec = StageExecution {
			stage: StageId::new("deny").expect("Stage id fixture should be valid."),
			config: json!({ "deny_message": "Not for you." }),
			request: RequestContext::anonymous(),
			context: PlanContext::default(),
			flow_info: FlowInfo::default(),
			services: StageServices::new(Arc::new(EmptyDirectory)),
		};
		let challenge = DenyStage.challenge(&exec).await.expect("Challenge should build.");

		assert_eq!(challenge.component, COMPONENT_ACCESS_DENIED);
		assert_eq!(challenge.payload["error_message"], json!("Not for you."));
	}
}
