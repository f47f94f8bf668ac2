//! Observability helpers and the error-telemetry port.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_transport.call` with the `call`
//!   (send/stream/renewal) and `stage` (call site) fields, plus warnings for skipped event
//!   lines and failed telemetry reports.
//! - Enable `metrics` to increment the `session_transport_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`. Renewals additionally feed
//!   `session_transport_renewal_total` (labeled by `result`: `renewed` or the failure cause)
//!   and `session_transport_renewal_shared_total` (labeled by `via`: `joined` or `reused`).

mod metrics;
mod report;
mod tracing;

pub use metrics::*;
pub use report::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the transport layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Buffered request through [`SessionClient::send`](crate::client::SessionClient::send).
	Send,
	/// Event stream consumption.
	Stream,
	/// Shared credential renewal.
	Renewal,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Send => "send",
			CallKind::Stream => "stream",
			CallKind::Renewal => "renewal",
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
	/// Entry to a transport operation.
	Attempt,
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
