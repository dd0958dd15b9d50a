// self
use crate::{
	_prelude::*,
	obs::{CallKind, CallOutcome},
};

/// Increments `bankdata_client_call_total` for one call step (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bankdata_client_call_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the backoff chosen before a retry in `bankdata_client_retry_delay_seconds`.
pub fn record_retry_delay(kind: CallKind, delay: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("bankdata_client_retry_delay_seconds", "kind" => kind.as_str())
			.record(delay.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, delay);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_call_outcome(CallKind::Api, CallOutcome::Failure);
		record_retry_delay(CallKind::Api, StdDuration::from_millis(300));
	}
}
