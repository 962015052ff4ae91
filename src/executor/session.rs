//! Execution sessions: per-invocation state wrapped around one plan.

// self
use crate::{
	_prelude::*,
	context::RequestContext,
	id::{FlowSlug, SessionId, UserRef},
	plan::{Plan, ResolvedStage},
	stage::ResponseErrors,
};

/// Lifecycle state of a flow execution session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// Created but not yet entered; transient during `start`.
	NotStarted,
	/// Accepting challenge responses.
	Running,
	/// Every resolved stage passed.
	Completed,
	/// The flow denied access.
	Denied,
	/// Cancelled explicitly or superseded by a newer session.
	Cancelled,
	/// Passed its expiry instant; terminal, callers must start fresh.
	Expired,
}
impl SessionState {
	/// Stable lowercase label for errors and diagnostics.
	pub const fn label(self) -> &'static str {
		match self {
			SessionState::NotStarted => "not started",
			SessionState::Running => "running",
			SessionState::Completed => "completed",
			SessionState::Denied => "denied",
			SessionState::Cancelled => "cancelled",
			SessionState::Expired => "expired",
		}
	}

	/// Returns true for states that accept no further transitions.
	pub const fn is_terminal(self) -> bool {
		matches!(
			self,
			SessionState::Completed
				| SessionState::Denied
				| SessionState::Cancelled
				| SessionState::Expired
		)
	}
}

/// One in-flight (or finished) execution of a flow.
///
/// Owned exclusively by the executor; mutations run strictly serialized per
/// session while reads work on cloned snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowExecutionSession {
	/// Opaque session identifier.
	pub id: SessionId,
	/// Flow the session executes.
	pub flow: FlowSlug,
	/// The resolved plan; stage order never changes after creation.
	pub plan: Plan,
	/// Index of the current stage within the plan.
	pub cursor: usize,
	/// Lifecycle state.
	pub state: SessionState,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant; operations past it fail with a terminal expiry error.
	pub expires_at: OffsetDateTime,
	/// User attached at start time, if the request was authenticated.
	pub user: Option<UserRef>,
	/// Device/browser correlation key used for supersession.
	pub correlation_key: Option<String>,
	/// Request context captured at start time.
	pub request: RequestContext,
	/// Plan snapshots taken after each passed stage, for the inspector.
	pub history: Vec<Plan>,
	/// Validation errors from the most recent rejected submission.
	pub last_errors: Option<ResponseErrors>,
	/// Final redirect target once the session is terminal.
	pub redirect: Option<String>,
}
impl FlowExecutionSession {
	/// The stage the cursor currently points at, if any.
	pub fn current_stage(&self) -> Option<&ResolvedStage> {
		self.plan.current_index().map(|idx| &self.plan.stages[idx])
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn terminal_states_are_classified() {
		assert!(!SessionState::Running.is_terminal());
		assert!(!SessionState::NotStarted.is_terminal());
		assert!(SessionState::Completed.is_terminal());
		assert!(SessionState::Denied.is_terminal());
		assert!(SessionState::Cancelled.is_terminal());
		assert!(SessionState::Expired.is_terminal());
	}
}
