// self
use crate::{
	error::RenewalError,
	obs::{CallKind, CallOutcome},
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"session_transport_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how a settled renewal ended, labeled `renewed` or by its failure cause.
pub fn record_renewal_result(outcome: &Result<(), RenewalError>) {
	let result = renewal_result_label(outcome);

	#[cfg(feature = "metrics")]
	metrics::counter!("session_transport_renewal_total", "result" => result).increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = result;
}

/// Records a caller that needed a renewal but did not start one.
///
/// `reused` distinguishes callers served from an already settled renewal from callers that
/// joined the one in flight.
pub fn record_renewal_shared(reused: bool) {
	let via = if reused { "reused" } else { "joined" };

	#[cfg(feature = "metrics")]
	metrics::counter!("session_transport_renewal_shared_total", "via" => via).increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = via;
}

fn renewal_result_label(outcome: &Result<(), RenewalError>) -> &'static str {
	match outcome {
		Ok(()) => "renewed",
		Err(e) => e.label(),
	}
}
