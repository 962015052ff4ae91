//! Flow definitions: designations, denial policy, and the flow catalog.

pub mod binding;

pub use binding::*;

// self
use crate::{
	_prelude::*,
	id::{FlowSlug, StageId},
};

/// Purpose a flow is designed for; immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDesignation {
	/// Log a user in.
	Authentication,
	/// Authorize an application on behalf of a user.
	Authorization,
	/// Enroll a new user.
	Enrollment,
	/// Log a user out.
	Invalidation,
	/// Recover access to an account.
	Recovery,
	/// Configure a single stage (e.g. register an authenticator).
	StageConfiguration,
	/// Remove a user account.
	Unenrollment,
}
impl FlowDesignation {
	/// Returns true when flow completion may trigger provider artifact issuance.
	pub fn issues_provider_artifacts(self) -> bool {
		matches!(self, FlowDesignation::Authentication | FlowDesignation::Authorization)
	}
}

/// What the executor answers when a flow denies access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeniedAction {
	#[default]
	/// Show a denial message with a continue link to the `?next` target.
	MessageContinue,
	/// Show a denial message only.
	Message,
	/// Skip the message and redirect to the default interface.
	Continue,
}

/// Authentication level a request must satisfy before the flow applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationRequirement {
	#[default]
	/// No requirement.
	None,
	/// Requires an authenticated session.
	RequireAuthenticated,
	/// Requires an unauthenticated session.
	RequireUnauthenticated,
	/// Requires an authenticated superuser.
	RequireSuperuser,
}

/// Combination rule for policy binding results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
	/// Passes when at least one binding passes.
	Any,
	#[default]
	/// Passes only when every binding passes.
	All,
}

/// Presentation hints carried opaquely through challenges; the engine never
/// interprets them beyond copying them into `flow_info`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAppearance {
	/// Title shown on flow pages.
	pub title: String,
	/// Layout identifier (stacked, content_left, ...).
	pub layout: String,
	/// Background image URL.
	pub background: Option<String>,
	/// Compatibility mode toggle for password-manager-friendly markup.
	pub compatibility_mode: bool,
}

/// Definition of a flow: an ordered set of policy-gated stage bindings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flow {
	/// URL-visible unique identifier.
	pub slug: FlowSlug,
	/// Human-readable name.
	pub name: String,
	/// Purpose of the flow; immutable after creation.
	pub designation: FlowDesignation,
	/// Authentication level required to enter the flow.
	pub authentication: AuthenticationRequirement,
	/// Default policy combination mode for this flow's bindings.
	pub policy_engine_mode: EngineMode,
	/// Behavior when the flow denies access.
	pub denied_action: DeniedAction,
	/// Flow-level policy bindings gating access to the flow itself.
	pub policies: Vec<PolicyBinding>,
	/// Ordered stage bindings.
	pub bindings: Vec<StageBinding>,
	/// Presentation hints copied into challenges.
	pub appearance: FlowAppearance,
}
impl Flow {
	/// Creates a flow with no bindings and default policies.
	pub fn new(slug: FlowSlug, name: impl Into<String>, designation: FlowDesignation) -> Self {
		let name = name.into();

		Self {
			slug,
			appearance: FlowAppearance {
				title: name.clone(),
				layout: "stacked".into(),
				background: None,
				compatibility_mode: false,
			},
			name,
			designation,
			authentication: AuthenticationRequirement::default(),
			policy_engine_mode: EngineMode::default(),
			denied_action: DeniedAction::default(),
			policies: Vec::new(),
			bindings: Vec::new(),
		}
	}

	/// Sets the authentication requirement.
	pub fn with_authentication(mut self, requirement: AuthenticationRequirement) -> Self {
		self.authentication = requirement;

		self
	}

	/// Sets the denied action.
	pub fn with_denied_action(mut self, action: DeniedAction) -> Self {
		self.denied_action = action;

		self
	}

	/// Sets the default policy engine mode.
	pub fn with_policy_engine_mode(mut self, mode: EngineMode) -> Self {
		self.policy_engine_mode = mode;

		self
	}

	/// Adds a flow-level policy binding.
	pub fn with_policy(mut self, binding: PolicyBinding) -> Self {
		self.policies.push(binding);

		self
	}

	/// Appends a stage binding; bindings keep their insertion index as the
	/// deterministic tie-break for equal order values.
	pub fn with_binding(mut self, binding: StageBinding) -> Self {
		self.bindings.push(binding);

		self
	}

	/// Bindings sorted by (order, insertion index); stable and deterministic.
	pub fn sorted_bindings(&self) -> Vec<(usize, &StageBinding)> {
		let mut indexed: Vec<(usize, &StageBinding)> = self.bindings.iter().enumerate().collect();

		indexed.sort_by_key(|(idx, binding)| (binding.order, *idx));

		indexed
	}
}

/// Stage instance definition: a component discriminator plus its configuration
/// snapshot, resolved through the registry at plan-build time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageDefinition {
	/// Unique stage identifier.
	pub id: StageId,
	/// Component discriminator matching a registered [`StageKind`].
	///
	/// [`StageKind`]: crate::stage::StageKind
	pub component: String,
	/// Configuration snapshot handed to the stage implementation.
	pub config: serde_json::Value,
}

/// In-memory catalog of flows and stage definitions consumed by the planner.
#[derive(Debug, Default)]
pub struct FlowCatalog {
	flows: HashMap<FlowSlug, Flow>,
	stages: HashMap<StageId, StageDefinition>,
}
impl FlowCatalog {
	/// Creates an empty catalog.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers or replaces a flow; the slug is the unique key.
	pub fn insert_flow(&mut self, flow: Flow) {
		self.flows.insert(flow.slug.clone(), flow);
	}

	/// Registers or replaces a stage definition.
	pub fn insert_stage(&mut self, stage: StageDefinition) {
		self.stages.insert(stage.id.clone(), stage);
	}

	/// Looks up a flow by slug.
	pub fn flow(&self, slug: &str) -> Option<&Flow> {
		self.flows.get(slug)
	}

	/// Looks up a stage definition.
	pub fn stage(&self, id: &StageId) -> Option<&StageDefinition> {
		self.stages.get(id)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn binding_order_is_stable_and_deterministic() {
		let slug = FlowSlug::new("ordering").expect("Flow slug fixture should be valid.");
		let stage_a = StageId::new("a").expect("Stage id fixture should be valid.");
		let stage_b = StageId::new("b").expect("Stage id fixture should be valid.");
		let stage_c = StageId::new("c").expect("Stage id fixture should be valid.");
		let flow = Flow::new(slug, "Ordering", FlowDesignation::Authentication)
			.with_binding(StageBinding::new(stage_b.clone(), 20))
			.with_binding(StageBinding::new(stage_a.clone(), 10))
			.with_binding(StageBinding::new(stage_c.clone(), 10));
		let sorted: Vec<&StageId> =
			flow.sorted_bindings().into_iter().map(|(_, b)| &b.stage).collect();

		// Equal order values fall back to creation order: a (10, idx 1) before c (10, idx 2).
		assert_eq!(sorted, vec![&stage_a, &stage_c, &stage_b]);
	}

	#[test]
	fn designations_flag_provider_terminals() {
		assert!(FlowDesignation::Authorization.issues_provider_artifacts());
		assert!(FlowDesignation::Authentication.issues_provider_artifacts());
		assert!(!FlowDesignation::Recovery.issues_provider_artifacts());
	}

	#[test]
	fn catalog_resolves_flows_by_slug() {
		let slug = FlowSlug::new("default-login").expect("Flow slug fixture should be valid.");
		let mut catalog = FlowCatalog::new();

		catalog.insert_flow(Flow::new(slug, "Login", FlowDesignation::Authentication));

		assert!(catalog.flow("default-login").is_some());
		assert!(catalog.flow("missing").is_none());
	}
}
