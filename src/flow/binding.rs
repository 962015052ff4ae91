//! Stage and policy bindings attaching stages and predicates to flows.

// self
use crate::{
	_prelude::*,
	flow::EngineMode,
	id::{PolicyId, StageId},
};

/// How the executor reacts to an invalid challenge response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidResponseAction {
	#[default]
	/// Return the error messages together with a similar challenge.
	Retry,
	/// Restart the flow from the beginning.
	Restart,
	/// Restart the flow while keeping the current plan context.
	RestartWithContext,
}

/// Attachment of a stage to a flow at a given order, guarded by policies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageBinding {
	/// Stage this binding points at.
	pub stage: StageId,
	/// Position within the flow; ties are broken by creation order.
	pub order: i32,
	/// Policies gating this binding.
	pub policies: Vec<PolicyBinding>,
	/// Evaluate the binding's policies while building the plan.
	pub evaluate_on_plan: bool,
	/// Re-check the binding's policies right before its stage becomes current.
	pub re_evaluate_policies: bool,
	/// Reaction to invalid challenge responses.
	pub invalid_response_action: InvalidResponseAction,
	/// Override of the flow's policy engine mode for this binding.
	pub policy_engine_mode: Option<EngineMode>,
}
impl StageBinding {
	/// Creates a binding with plan-time evaluation and no policies.
	pub fn new(stage: StageId, order: i32) -> Self {
		Self {
			stage,
			order,
			policies: Vec::new(),
			evaluate_on_plan: true,
			re_evaluate_policies: false,
			invalid_response_action: InvalidResponseAction::default(),
			policy_engine_mode: None,
		}
	}

	/// Adds a policy binding.
	pub fn with_policy(mut self, policy: PolicyBinding) -> Self {
		self.policies.push(policy);

		self
	}

	/// Toggles plan-time policy evaluation.
	pub fn evaluate_on_plan(mut self, evaluate: bool) -> Self {
		self.evaluate_on_plan = evaluate;

		self
	}

	/// Toggles policy re-evaluation right before the stage becomes current.
	pub fn re_evaluate_policies(mut self, re_evaluate: bool) -> Self {
		self.re_evaluate_policies = re_evaluate;

		self
	}

	/// Overrides the invalid-response reaction.
	pub fn with_invalid_response_action(mut self, action: InvalidResponseAction) -> Self {
		self.invalid_response_action = action;

		self
	}

	/// Overrides the policy engine mode for this binding.
	pub fn with_policy_engine_mode(mut self, mode: EngineMode) -> Self {
		self.policy_engine_mode = Some(mode);

		self
	}
}

/// Attachment of a policy to a flow or stage binding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyBinding {
	/// Policy this binding points at.
	pub policy: PolicyId,
	/// Evaluation order; informational only, results never depend on it.
	pub order: i32,
	/// Inverts the policy result (pass becomes fail and vice versa).
	pub negate: bool,
	/// Maximum evaluation time before the result degrades to a timeout failure.
	pub timeout: Duration,
}
impl PolicyBinding {
	/// Default per-binding evaluation timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a binding with the default timeout.
	pub fn new(policy: PolicyId, order: i32) -> Self {
		Self { policy, order, negate: false, timeout: Self::DEFAULT_TIMEOUT }
	}

	/// Inverts the policy result.
	pub fn negated(mut self) -> Self {
		self.negate = true;

		self
	}

	/// Overrides the evaluation timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}
}
