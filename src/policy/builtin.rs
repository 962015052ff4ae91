//! Built-in policy implementations covering the common gating predicates.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	context::{PlanContext, RequestContext},
	policy::{Policy, PolicyEvalError, PolicyVerdict},
};

/// Policy with a fixed outcome; useful as a default-deny or override-allow.
#[derive(Clone, Debug)]
pub struct StaticPolicy {
	passing: bool,
	message: Option<String>,
}
impl StaticPolicy {
	/// A policy that always passes.
	pub fn allow() -> Self {
		Self { passing: true, message: None }
	}

	/// A policy that always fails with the provided message.
	pub fn deny(message: impl Into<String>) -> Self {
		Self { passing: false, message: Some(message.into()) }
	}
}
impl Policy for StaticPolicy {
	fn evaluate(
		&self,
		_: &RequestContext,
		_: &PlanContext,
	) -> Result<PolicyVerdict, PolicyEvalError> {
		Ok(PolicyVerdict { passing: self.passing, message: self.message.clone() })
	}
}

/// Passes only for requests carrying an authenticated session.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthenticatedPolicy;
impl Policy for AuthenticatedPolicy {
	fn evaluate(
		&self,
		request: &RequestContext,
		_: &PlanContext,
	) -> Result<PolicyVerdict, PolicyEvalError> {
		if request.authenticated {
			Ok(PolicyVerdict::pass())
		} else {
			Ok(PolicyVerdict::fail("Request is not authenticated."))
		}
	}
}

/// Passes when the requesting user belongs to the configured group.
#[derive(Clone, Debug)]
pub struct GroupMembershipPolicy {
	group: String,
}
impl GroupMembershipPolicy {
	/// Creates a membership check for `group`.
	pub fn new(group: impl Into<String>) -> Self {
		Self { group: group.into() }
	}
}
impl Policy for GroupMembershipPolicy {
	fn evaluate(
		&self,
		request: &RequestContext,
		_: &PlanContext,
	) -> Result<PolicyVerdict, PolicyEvalError> {
		if request.groups.iter().any(|group| group == &self.group) {
			Ok(PolicyVerdict::pass())
		} else {
			Ok(PolicyVerdict::fail(format!("User is not a member of `{}`.", self.group)))
		}
	}
}

/// Passes when a plan-context key holds the expected value.
///
/// Typical use is gating a later stage on data collected by an earlier one,
/// combined with `re_evaluate_policies` on the binding.
#[derive(Clone, Debug)]
pub struct ContextValuePolicy {
	key: String,
	expected: Value,
}
impl ContextValuePolicy {
	/// Creates an equality check on a plan-context key.
	pub fn new(key: impl Into<String>, expected: Value) -> Self {
		Self { key: key.into(), expected }
	}
}
impl Policy for ContextValuePolicy {
	fn evaluate(
		&self,
		_: &RequestContext,
		plan: &PlanContext,
	) -> Result<PolicyVerdict, PolicyEvalError> {
		match plan.get(&self.key) {
			Some(value) if value == &self.expected => Ok(PolicyVerdict::pass()),
			_ => Ok(PolicyVerdict::fail_silent()),
		}
	}
}
