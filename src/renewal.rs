//! Single-flight credential renewal.
//!
//! [`RenewalCoordinator`] guarantees that at most one renewal call is outstanding at any
//! instant. The first caller that observes an authentication failure moves the coordinator
//! from `Idle` to `InFlight` and starts the call; every caller arriving while it is in
//! flight attaches to the same shared future instead of issuing its own. When the call
//! settles a drop guard moves the coordinator back to `Idle`, bumps the epoch, and records
//! the outcome. The guard runs on success, failure, and panic alike, so the coordinator can
//! never stay stuck in `InFlight`.
//!
//! Each settled renewal closes an epoch. Callers that dispatched their request during an
//! earlier epoch and only see the authentication failure after that epoch closed reuse the
//! recorded outcome rather than starting (or failing) a second renewal for the same wave.

mod endpoint;
mod metrics;

pub use endpoint::HttpRenewer;
pub use metrics::{RenewalMetrics, RenewalSnapshot};

// std
use std::{panic::AssertUnwindSafe, sync::Weak};
// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::{
	_prelude::*,
	error::RenewalError,
	obs::{self, CallKind, CallOutcome, CallSpan},
	session::SessionStore,
};

/// Boxed future returned by [`Renewer::renew`].
pub type RenewalFuture = BoxFuture<'static, Result<(), RenewalError>>;

type RenewalOutcome = Result<(), RenewalError>;
type SharedRenewal = Shared<RenewalFuture>;

/// Performs one renewal call against the external refresh endpoint.
///
/// The returned future must own everything it touches: it is shared between every waiter
/// and may be driven by whichever of them polls it.
pub trait Renewer
where
	Self: 'static + Send + Sync,
{
	/// Starts a renewal call.
	fn renew(&self) -> RenewalFuture;
}

enum Phase {
	Idle,
	InFlight(SharedRenewal),
}

struct RenewalState {
	phase: Phase,
	epoch: u64,
	last_outcome: Option<RenewalOutcome>,
}

enum Attachment {
	Settled(RenewalOutcome),
	Pending(SharedRenewal),
}

/// Owns the renewal state machine; share it behind an `Arc`.
pub struct RenewalCoordinator {
	renewer: Arc<dyn Renewer>,
	store: Arc<dyn SessionStore>,
	state: Arc<Mutex<RenewalState>>,
	metrics: Arc<RenewalMetrics>,
}
impl RenewalCoordinator {
	/// Creates an idle coordinator.
	pub fn new(renewer: Arc<dyn Renewer>, store: Arc<dyn SessionStore>) -> Self {
		Self {
			renewer,
			store,
			state: Arc::new(Mutex::new(RenewalState {
				phase: Phase::Idle,
				epoch: 0,
				last_outcome: None,
			})),
			metrics: Default::default(),
		}
	}

	/// Number of renewals that have settled so far.
	pub fn epoch(&self) -> u64 {
		self.state.lock().epoch
	}

	/// Returns `true` while a renewal call is outstanding.
	pub fn is_in_flight(&self) -> bool {
		matches!(self.state.lock().phase, Phase::InFlight(_))
	}

	/// Counters for renewal calls started by this coordinator.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	/// Starts a renewal, or attaches to the one already in flight, and waits for it to settle.
	///
	/// Fails with [`Error::AuthenticationExpired`] when the renewal fails; in that case the
	/// session store's clear hook has been invoked exactly once for the whole renewal.
	pub async fn ensure_valid_credential(&self) -> Result<()> {
		let epoch = self.epoch();

		self.ensure_valid_credential_since(epoch).await
	}

	/// Like [`ensure_valid_credential`](Self::ensure_valid_credential), for a caller that
	/// dispatched its request during `observed_epoch`.
	///
	/// If a renewal has settled since then, its recorded outcome is returned without
	/// contacting the renewal endpoint.
	pub async fn ensure_valid_credential_since(&self, observed_epoch: u64) -> Result<()> {
		let outcome = match self.attach(observed_epoch) {
			Attachment::Settled(outcome) => outcome,
			Attachment::Pending(shared) =>
				CallSpan::new(CallKind::Renewal, "ensure_valid_credential").instrument(shared).await,
		};

		outcome.map_err(Error::expired)
	}

	fn attach(&self, observed_epoch: u64) -> Attachment {
		let mut state = self.state.lock();

		if state.epoch > observed_epoch {
			if let Some(outcome) = state.last_outcome.clone() {
				self.metrics.record_reused();
				obs::record_renewal_shared(true);

				return Attachment::Settled(outcome);
			}
		}

		match &state.phase {
			Phase::InFlight(shared) => {
				self.metrics.record_joined();
				obs::record_renewal_shared(false);

				Attachment::Pending(shared.clone())
			},
			Phase::Idle => {
				let shared = self.start(state.epoch);

				state.phase = Phase::InFlight(shared.clone());

				Attachment::Pending(shared)
			},
		}
	}

	fn start(&self, epoch: u64) -> SharedRenewal {
		let renewal = self.renewer.renew();
		let store = self.store.clone();
		let metrics = self.metrics.clone();
		let settle = SettleGuard { state: Arc::downgrade(&self.state), epoch, outcome: None };

		obs::record_call_outcome(CallKind::Renewal, CallOutcome::Attempt);
		metrics.record_started();

		async move {
			let outcome = AssertUnwindSafe(renewal)
				.catch_unwind()
				.await
				.unwrap_or(Err(RenewalError::Interrupted));

			if outcome.is_err() {
				store.clear();
			}

			metrics.record_settled(&outcome);
			obs::record_renewal_result(&outcome);
			obs::record_call_outcome(CallKind::Renewal, match &outcome {
				Ok(()) => CallOutcome::Success,
				Err(_) => CallOutcome::Failure,
			});

			settle.settle(outcome)
		}
		.boxed()
		.shared()
	}
}
impl Debug for RenewalCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RenewalCoordinator")
			.field("in_flight", &matches!(state.phase, Phase::InFlight(_)))
			.field("epoch", &state.epoch)
			.finish()
	}
}

/// Moves the coordinator back to `Idle` when the renewal future completes or is dropped.
struct SettleGuard {
	state: Weak<Mutex<RenewalState>>,
	epoch: u64,
	outcome: Option<RenewalOutcome>,
}
impl SettleGuard {
	/// Records `outcome` for late callers and releases the coordinator.
	fn settle(mut self, outcome: RenewalOutcome) -> RenewalOutcome {
		self.outcome = Some(outcome.clone());

		outcome
	}
}
impl Drop for SettleGuard {
	fn drop(&mut self) {
		let Some(state) = self.state.upgrade() else { return };
		let mut state = state.lock();

		if state.epoch != self.epoch {
			return;
		}

		state.phase = Phase::Idle;
		state.epoch += 1;
		state.last_outcome = Some(self.outcome.take().unwrap_or(Err(RenewalError::Interrupted)));
	}
}
