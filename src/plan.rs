//! Plans: the resolved, session-specific stage list for one flow invocation.

pub mod builder;

pub use builder::*;

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	context::PlanContext,
	flow::{DeniedAction, EngineMode, FlowAppearance, FlowDesignation, InvalidResponseAction, PolicyBinding},
	id::{FlowSlug, ProviderId, StageId},
	provider::AuthorizationRequest,
	stage::FlowInfo,
};

/// Runtime status of a resolved stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
	/// Not yet reached.
	Pending,
	/// The stage the session cursor points at.
	Current,
	/// Successfully passed.
	Completed,
	/// Skipped at runtime after a policy re-evaluation failed.
	Skipped,
}

/// Per-stage marker attached while building the plan.
///
/// A reevaluate marker repeats the binding's policy check right before the
/// stage would become current; bindings whose applicability can change
/// mid-session (e.g. the user authenticated partway through) opt into it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StageMarker {
	/// No special handling.
	Default,
	/// Re-run these policy bindings before entering the stage.
	Reevaluate {
		/// Policy bindings to re-check.
		bindings: Vec<PolicyBinding>,
		/// Combination mode for the re-check.
		mode: EngineMode,
	},
}

/// Plan-level marker attached while building the plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PlanMarker {
	/// Completion of this plan mints an artifact against the provider.
	ProviderTerminal {
		/// Provider bound to the initiating application.
		provider: ProviderId,
		/// OAuth 2.0 authorization parameters, when applicable.
		authorization: Option<AuthorizationRequest>,
	},
}

/// Stage resolved into a plan with its configuration snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedStage {
	/// Stage instance identifier.
	pub stage: StageId,
	/// Component discriminator.
	pub component: String,
	/// Configuration snapshot taken at plan-build time.
	pub config: Value,
	/// Runtime status; ordering never changes after the build.
	pub status: StageStatus,
	/// Marker controlling runtime re-evaluation.
	pub marker: StageMarker,
	/// Reaction to invalid challenge responses.
	pub invalid_response_action: InvalidResponseAction,
}

/// Denial attached to a plan whose flow did not apply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Denial {
	/// Message shown to the user.
	pub message: String,
	/// Continue target, when the denied action allows continuing.
	pub to: Option<String>,
}

/// Immutable, ordered stage list owned by exactly one execution session.
///
/// Stages may be marked completed or skipped but never reordered; the context
/// is owned exclusively by this plan and never shared across sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
	/// Flow this plan was built from.
	pub flow: FlowSlug,
	/// Designation copied from the flow.
	pub designation: FlowDesignation,
	/// Denied action copied from the flow.
	pub denied_action: DeniedAction,
	/// Presentation metadata copied from the flow.
	pub appearance: FlowAppearance,
	/// Resolved stages in execution order.
	pub stages: Vec<ResolvedStage>,
	/// Mutable key-value bag threaded through stage execution.
	pub context: PlanContext,
	/// Plan-level markers.
	pub markers: Vec<PlanMarker>,
	/// Set when the flow denied access at build time.
	pub denial: Option<Denial>,
}
impl Plan {
	/// Presentation metadata for challenge envelopes.
	pub fn flow_info(&self) -> FlowInfo {
		FlowInfo {
			title: self.appearance.title.clone(),
			layout: self.appearance.layout.clone(),
			background: self.appearance.background.clone(),
			cancel_url: None,
		}
	}

	/// The provider-terminal marker, when one was attached.
	pub fn provider_terminal(&self) -> Option<(&ProviderId, Option<&AuthorizationRequest>)> {
		self.markers.iter().find_map(|marker| match marker {
			PlanMarker::ProviderTerminal { provider, authorization } =>
				Some((provider, authorization.as_ref())),
		})
	}

	/// Index of the stage currently marked [`StageStatus::Current`].
	pub fn current_index(&self) -> Option<usize> {
		self.stages.iter().position(|stage| stage.status == StageStatus::Current)
	}
}
