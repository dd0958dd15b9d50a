//! Optional observability helpers for token acquisitions and executor calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bankdata_client.call` with the `kind`
//!   and `operation` fields, plus events for retries, re-authentication, and failures.
//! - Enable `metrics` to increment the `bankdata_client_call_total` counter for every
//!   attempt/retry/reauthenticate/success/failure, labeled by `kind` + `outcome`, and to
//!   record every backoff in the `bankdata_client_retry_delay_seconds` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Upstream call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// `POST /token/new/` issued by the token manager.
	TokenAcquisition,
	/// Domain call issued through the executor.
	Api,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::TokenAcquisition => "token_acquisition",
			CallKind::Api => "api",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a logical call.
	Attempt,
	/// A transient failure is about to be retried.
	Retry,
	/// The token was rejected and is being re-acquired.
	Reauthenticate,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Retry => "retry",
			CallOutcome::Reauthenticate => "reauthenticate",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
