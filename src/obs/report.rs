//! Fire-and-forget telemetry port for server-side failures.

// crates.io
use http::Method;
// self
use crate::_prelude::*;

/// Boxed failure returned by an [`ErrorReporter`].
pub type ReportError = Box<dyn StdError + Send + Sync>;

/// Snapshot of a 5xx response handed to the telemetry collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
	/// HTTP status of the failed response.
	pub status: u16,
	/// Resolved request URL.
	pub url: Url,
	/// Request method.
	pub method: Method,
	/// Response body decoded as UTF-8 (lossy).
	pub body: String,
}

/// Side-effect port receiving every server error the session client observes.
///
/// Implementations must not block: the call happens inline on the request path.
/// Collectors that need network access should hand the report to their own task.
/// Returned errors are logged and never change the caller's result.
pub trait ErrorReporter
where
	Self: Send + Sync,
{
	/// Records `report`.
	fn report(&self, report: ErrorReport) -> Result<(), ReportError>;
}

/// Reporter that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;
impl ErrorReporter for NoopReporter {
	fn report(&self, report: ErrorReport) -> Result<(), ReportError> {
		let _ = report;

		Ok(())
	}
}

/// Reporter that emits an error-level log event (when `tracing` is enabled).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;
impl ErrorReporter for TracingReporter {
	fn report(&self, report: ErrorReport) -> Result<(), ReportError> {
		#[cfg(feature = "tracing")]
		{
			tracing::error!(
				status = report.status,
				method = %report.method,
				url = %report.url,
				body = %report.body,
				"Server error observed."
			);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = report;
		}

		Ok(())
	}
}
