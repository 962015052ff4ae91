// self
use crate::obs::{EngineOp, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_engine_op(op: EngineOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"authflow_engine_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records tokens revoked by authorization-code replay detection.
pub fn record_replay_revocations(count: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("authflow_replay_revoked_tokens_total").increment(count as u64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = count;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_engine_op_noop_without_metrics() {
		record_engine_op(EngineOp::RedeemCode, OpOutcome::Failure);
		record_replay_revocations(2);
	}
}
