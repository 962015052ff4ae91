//! Policy contracts and the evaluation engine gating stage inclusion.

pub mod builtin;
pub mod engine;

pub use builtin::*;
pub use engine::*;

// self
use crate::{
	_prelude::*,
	context::{PlanContext, RequestContext},
};

/// Outcome of one policy evaluation before negation is applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
	/// Whether the policy passed.
	pub passing: bool,
	/// Optional message surfaced to the end user on denial.
	pub message: Option<String>,
}
impl PolicyVerdict {
	/// Creates a passing verdict.
	pub fn pass() -> Self {
		Self { passing: true, message: None }
	}

	/// Creates a failing verdict with a user-facing message.
	pub fn fail(message: impl Into<String>) -> Self {
		Self { passing: false, message: Some(message.into()) }
	}

	/// Creates a failing verdict without a message.
	pub fn fail_silent() -> Self {
		Self { passing: false, message: None }
	}
}

/// Internal failure raised by a policy implementation.
///
/// Distinct from a denial: the engine records it as an execution error and
/// treats the binding as failed without inverting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Policy evaluation failed: {message}.")]
pub struct PolicyEvalError {
	/// Human-readable description of the internal failure.
	pub message: String,
}
impl PolicyEvalError {
	/// Creates a new evaluation error.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Predicate evaluated against the request and plan context.
///
/// Implementations must not mutate state observable by sibling evaluations;
/// the engine may evaluate bindings in any order and the combined decision
/// must be reproducible for identical inputs.
pub trait Policy: Send + Sync {
	/// Evaluates the policy; internal failures go through `Err`.
	fn evaluate(
		&self,
		request: &RequestContext,
		plan: &PlanContext,
	) -> Result<PolicyVerdict, PolicyEvalError>;
}
