//! Policy binding evaluation and ANY/ALL result combination.

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	context::{PlanContext, RequestContext},
	flow::{EngineMode, PolicyBinding},
	id::PolicyId,
	policy::Policy,
};

/// Classification of one binding's evaluation result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingResultKind {
	/// The binding passed (after negation).
	Pass,
	/// The binding failed (after negation).
	Fail,
	/// The policy raised an internal error; never inverted, always surfaced.
	ExecutionError,
	/// Evaluation exceeded the binding timeout; never inverted, always surfaced.
	Timeout,
}

/// Result of evaluating a single policy binding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingResult {
	/// Policy the binding pointed at.
	pub policy: PolicyId,
	/// Whether the binding inverted the raw verdict.
	pub negated: bool,
	/// Effective pass/fail after negation and error handling.
	pub passing: bool,
	/// Classification of the result.
	pub kind: BindingResultKind,
	/// Messages contributed to the combined decision.
	pub messages: Vec<String>,
	/// Wall-clock evaluation time in milliseconds.
	pub elapsed_ms: u128,
}

/// Combined decision over a set of policy bindings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
	/// Whether the set as a whole passes under the requested mode.
	pub passing: bool,
	/// User-facing messages collected from failing bindings and errors.
	pub messages: Vec<String>,
	/// Per-binding results in binding order, for diagnostics.
	pub results: Vec<BindingResult>,
}
impl Decision {
	/// A decision that passes trivially (no bindings attached).
	pub fn passing_empty() -> Self {
		Self { passing: true, messages: Vec::new(), results: Vec::new() }
	}
}

/// Registry and evaluation engine for policies.
///
/// Every binding is evaluated independently: no short-circuiting, so internal
/// errors and timeouts always land in the combined message list regardless of
/// mode. Given identical inputs the decision is reproducible; binding order
/// only affects the ordering of `results`.
#[derive(Default)]
pub struct PolicyEngine {
	policies: HashMap<PolicyId, Arc<dyn Policy>>,
}
impl PolicyEngine {
	/// Creates an empty engine.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a policy implementation under its identifier.
	pub fn register(&mut self, id: PolicyId, policy: Arc<dyn Policy>) {
		self.policies.insert(id, policy);
	}

	/// Evaluates the bindings and combines the results under `mode`.
	pub fn evaluate(
		&self,
		bindings: &[PolicyBinding],
		request: &RequestContext,
		plan: &PlanContext,
		mode: EngineMode,
	) -> Decision {
		if bindings.is_empty() {
			return Decision::passing_empty();
		}

		let results: Vec<BindingResult> =
			bindings.iter().map(|binding| self.evaluate_binding(binding, request, plan)).collect();
		let passing = match mode {
			EngineMode::All => results.iter().all(|result| result.passing),
			EngineMode::Any => results.iter().any(|result| result.passing),
		};
		let messages = results
			.iter()
			.filter(|result| {
				!result.passing
					|| matches!(
						result.kind,
						BindingResultKind::ExecutionError | BindingResultKind::Timeout
					)
			})
			.flat_map(|result| result.messages.iter().cloned())
			.collect();

		Decision { passing, messages, results }
	}

	fn evaluate_binding(
		&self,
		binding: &PolicyBinding,
		request: &RequestContext,
		plan: &PlanContext,
	) -> BindingResult {
		let Some(policy) = self.policies.get(&binding.policy) else {
			return BindingResult {
				policy: binding.policy.clone(),
				negated: binding.negate,
				passing: false,
				kind: BindingResultKind::ExecutionError,
				messages: vec![format!("Policy `{}` is not registered.", binding.policy)],
				elapsed_ms: 0,
			};
		};
		let started = Instant::now();
		let outcome = policy.evaluate(request, plan);
		let elapsed = started.elapsed();
		let elapsed_ms = elapsed.as_millis();
		let timeout_exceeded = !binding.timeout.is_negative()
			&& elapsed.as_millis() > binding.timeout.whole_milliseconds().unsigned_abs();

		match outcome {
			Err(err) => BindingResult {
				policy: binding.policy.clone(),
				negated: binding.negate,
				passing: false,
				kind: BindingResultKind::ExecutionError,
				messages: vec![err.to_string()],
				elapsed_ms,
			},
			Ok(_) if timeout_exceeded => BindingResult {
				policy: binding.policy.clone(),
				negated: binding.negate,
				passing: false,
				kind: BindingResultKind::Timeout,
				messages: vec![format!(
					"Policy `{}` exceeded its evaluation timeout.",
					binding.policy
				)],
				elapsed_ms,
			},
			Ok(verdict) => {
				let passing = verdict.passing != binding.negate;
				let kind =
					if passing { BindingResultKind::Pass } else { BindingResultKind::Fail };
				let messages = if passing {
					Vec::new()
				} else {
					verdict.message.into_iter().collect()
				};

				BindingResult {
					policy: binding.policy.clone(),
					negated: binding.negate,
					passing,
					kind,
					messages,
					elapsed_ms,
				}
			},
		}
	}
}
impl Debug for PolicyEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PolicyEngine").field("policies", &self.policies.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{thread, time::Duration as StdDuration};
	// self
	use super::*;
	use crate::policy::{PolicyEvalError, PolicyVerdict, StaticPolicy};

	struct ErroringPolicy;
	impl Policy for ErroringPolicy {
		fn evaluate(
			&self,
			_: &RequestContext,
			_: &PlanContext,
		) -> Result<PolicyVerdict, PolicyEvalError> {
			Err(PolicyEvalError::new("expression raised an exception"))
		}
	}

	struct SlowPolicy;
	impl Policy for SlowPolicy {
		fn evaluate(
			&self,
			_: &RequestContext,
			_: &PlanContext,
		) -> Result<PolicyVerdict, PolicyEvalError> {
			thread::sleep(StdDuration::from_millis(20));

			Ok(PolicyVerdict::pass())
		}
	}

	fn engine_with(entries: Vec<(&str, Arc<dyn Policy>)>) -> PolicyEngine {
		let mut engine = PolicyEngine::new();

		for (id, policy) in entries {
			engine.register(
				PolicyId::new(id).expect("Policy id fixture should be valid."),
				policy,
			);
		}

		engine
	}

	fn binding(id: &str) -> PolicyBinding {
		PolicyBinding::new(PolicyId::new(id).expect("Policy id fixture should be valid."), 0)
	}

	#[test]
	fn empty_binding_set_passes() {
		let engine = PolicyEngine::new();
		let decision = engine.evaluate(
			&[],
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(decision.passing);
		assert!(decision.results.is_empty());
	}

	#[test]
	fn all_mode_requires_every_binding_to_pass() {
		let engine = engine_with(vec![
			("allow", Arc::new(StaticPolicy::allow())),
			("deny", Arc::new(StaticPolicy::deny("no access"))),
		]);
		let bindings = [binding("allow"), binding("deny")];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(!decision.passing);
		assert_eq!(decision.messages, vec!["no access".to_string()]);
	}

	#[test]
	fn any_mode_passes_with_a_single_pass() {
		let engine = engine_with(vec![
			("allow", Arc::new(StaticPolicy::allow())),
			("deny", Arc::new(StaticPolicy::deny("no access"))),
		]);
		let bindings = [binding("allow"), binding("deny")];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::Any,
		);

		assert!(decision.passing);
	}

	#[test]
	fn negation_applies_de_morgan() {
		let engine = engine_with(vec![("deny", Arc::new(StaticPolicy::deny("no access")))]);
		let bindings = [binding("deny").negated()];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(decision.passing, "A negated failing policy should count as passing.");
	}

	#[test]
	fn execution_errors_are_failures_and_never_inverted() {
		let engine = engine_with(vec![("broken", Arc::new(ErroringPolicy))]);
		let bindings = [binding("broken").negated()];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(!decision.passing, "Errors must fail even when the binding negates.");
		assert_eq!(decision.results[0].kind, BindingResultKind::ExecutionError);
		assert!(!decision.messages.is_empty(), "Execution errors must always be surfaced.");
	}

	#[test]
	fn error_messages_survive_a_passing_any_decision() {
		let engine = engine_with(vec![
			("allow", Arc::new(StaticPolicy::allow())),
			("broken", Arc::new(ErroringPolicy)),
		]);
		let bindings = [binding("allow"), binding("broken")];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::Any,
		);

		assert!(decision.passing);
		assert!(
			decision.messages.iter().any(|message| message.contains("expression raised")),
			"Error messages must be surfaced even when the overall decision passes."
		);
	}

	#[test]
	fn slow_policies_degrade_to_timeout_failures() {
		let engine = engine_with(vec![("slow", Arc::new(SlowPolicy))]);
		let bindings = [binding("slow").with_timeout(Duration::milliseconds(1))];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(!decision.passing);
		assert_eq!(decision.results[0].kind, BindingResultKind::Timeout);
	}

	#[test]
	fn missing_policy_is_an_execution_error_not_a_crash() {
		let engine = PolicyEngine::new();
		let bindings = [binding("ghost")];
		let decision = engine.evaluate(
			&bindings,
			&RequestContext::anonymous(),
			&PlanContext::default(),
			EngineMode::All,
		);

		assert!(!decision.passing);
		assert_eq!(decision.results[0].kind, BindingResultKind::ExecutionError);
	}

	#[test]
	fn decisions_are_reproducible() {
		let engine = engine_with(vec![
			("allow", Arc::new(StaticPolicy::allow())),
			("deny", Arc::new(StaticPolicy::deny("no access"))),
		]);
		let bindings = [binding("deny"), binding("allow")];
		let request = RequestContext::anonymous();
		let plan = PlanContext::default();
		let first = engine.evaluate(&bindings, &request, &plan, EngineMode::Any);
		let second = engine.evaluate(&bindings, &request, &plan, EngineMode::Any);

		assert_eq!(first.passing, second.passing);
		assert_eq!(first.messages, second.messages);
	}
}
