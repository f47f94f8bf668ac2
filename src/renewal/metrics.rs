// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::error::RenewalError;

/// Per-coordinator renewal counters.
///
/// Besides the calls that actually reached the renewal endpoint, the counters track how many
/// callers were spared a call: `joined` attached to a renewal already in flight, `reused`
/// arrived after it settled and took the recorded outcome.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	started: AtomicU64,
	renewed: AtomicU64,
	rejected: AtomicU64,
	unreachable: AtomicU64,
	unusable: AtomicU64,
	interrupted: AtomicU64,
	joined: AtomicU64,
	reused: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of renewal calls actually started.
	pub fn attempts(&self) -> u64 {
		self.started.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal calls that settled successfully.
	pub fn successes(&self) -> u64 {
		self.renewed.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal calls that failed, whatever the cause.
	pub fn failures(&self) -> u64 {
		let snapshot = self.snapshot();

		snapshot.rejected + snapshot.unreachable + snapshot.unusable + snapshot.interrupted
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RenewalSnapshot {
		RenewalSnapshot {
			started: self.started.load(Ordering::Relaxed),
			renewed: self.renewed.load(Ordering::Relaxed),
			rejected: self.rejected.load(Ordering::Relaxed),
			unreachable: self.unreachable.load(Ordering::Relaxed),
			unusable: self.unusable.load(Ordering::Relaxed),
			interrupted: self.interrupted.load(Ordering::Relaxed),
			joined: self.joined.load(Ordering::Relaxed),
			reused: self.reused.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn record_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_settled(&self, outcome: &Result<(), RenewalError>) {
		let counter = match outcome {
			Ok(()) => &self.renewed,
			Err(RenewalError::Rejected { .. }) => &self.rejected,
			Err(RenewalError::Unreachable { .. }) => &self.unreachable,
			Err(RenewalError::MissingCredential | RenewalError::InvalidResponse { .. }) =>
				&self.unusable,
			Err(RenewalError::Interrupted) => &self.interrupted,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reused(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`RenewalMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenewalSnapshot {
	/// Renewal calls sent to the endpoint.
	pub started: u64,
	/// Renewals that produced a fresh credential.
	pub renewed: u64,
	/// Renewals the endpoint answered with a non-success status.
	pub rejected: u64,
	/// Renewals that never got a response.
	pub unreachable: u64,
	/// Renewals with no refresh credential to send or an unusable grant in return.
	pub unusable: u64,
	/// Renewals that panicked or were torn down before settling.
	pub interrupted: u64,
	/// Callers that waited on a renewal someone else started.
	pub joined: u64,
	/// Late callers served from an already settled renewal.
	pub reused: u64,
}
