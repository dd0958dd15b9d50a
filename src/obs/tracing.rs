// self
use crate::{
	_prelude::*,
	obs::{CallKind, CallOutcome},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by the token manager and the executor.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + operation.
	pub fn new(kind: CallKind, operation: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bankdata_client.call", kind = kind.as_str(), operation);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, operation);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an event describing a non-terminal step (retry, re-authentication) of a call.
pub fn record_call_event(
	kind: CallKind,
	outcome: CallOutcome,
	attempt: u32,
	status: u16,
	delay: Option<StdDuration>,
) {
	#[cfg(feature = "tracing")]
	{
		let delay_ms = delay.map(|value| value.as_millis() as u64);

		tracing::warn!(
			kind = kind.as_str(),
			outcome = outcome.as_str(),
			attempt,
			status,
			delay_ms,
			"Upstream call did not succeed; continuing."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, outcome, attempt, status, delay);
	}
}

/// Emits an event for a failure that is returned to the caller.
pub fn record_call_failure(kind: CallKind, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(
			kind = kind.as_str(),
			status = err.status(),
			class = ?err.class(),
			error = %err,
			"Upstream call failed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err);
	}
}
