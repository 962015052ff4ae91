//! Optional observability helpers for executor and token-engine operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `authflow.op` with the
//!   `op` (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `authflow_engine_op_total` counter for
//!   every attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Engine operations observed across the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineOp {
	/// Plan construction during `start`.
	Plan,
	/// Challenge response processing.
	Submit,
	/// Authorization-code issuance.
	IssueCode,
	/// Authorization-code redemption.
	RedeemCode,
	/// Refresh-token rotation.
	Refresh,
	/// SAML assertion issuance.
	IssueAssertion,
}
impl EngineOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EngineOp::Plan => "plan",
			EngineOp::Submit => "submit",
			EngineOp::IssueCode => "issue_code",
			EngineOp::RedeemCode => "redeem_code",
			EngineOp::Refresh => "refresh",
			EngineOp::IssueAssertion => "issue_assertion",
		}
	}
}
impl Display for EngineOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an engine operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a result reference to a success/failure label.
	pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
		match result {
			Ok(_) => OpOutcome::Success,
			Err(_) => OpOutcome::Failure,
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
