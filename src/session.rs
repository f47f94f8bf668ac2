//! Session credential contracts and the built-in in-memory store.
//!
//! The transport layer never inspects credentials. It asks a [`SessionStore`] to decorate
//! each outbound request, to decorate and absorb the renewal call, and to forget the
//! session when renewal fails for good.

pub mod memory;
pub mod secret;

pub use memory::{MemorySessionStore, SessionCredential};
pub use secret::CredentialSecret;

// self
use crate::{error::RenewalError, http::HttpResponse, request::OutboundRequest};

/// Holder of the session credential, supplied by the embedding application.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Attaches the current credential to an outbound API request.
	fn attach(&self, request: &mut OutboundRequest);

	/// Decorates the renewal request (e.g. with a stored refresh token).
	///
	/// Cookie-based sessions rely on ambient credentials and keep the default no-op.
	fn attach_renewal(&self, request: &mut OutboundRequest) -> Result<(), RenewalError> {
		let _ = request;

		Ok(())
	}

	/// Applies a successful renewal response to the stored credential.
	///
	/// Cookie-based sessions are refreshed by the response itself and keep the default no-op.
	fn absorb_renewal(&self, response: &HttpResponse) -> Result<(), RenewalError> {
		let _ = response;

		Ok(())
	}

	/// Clear-session hook; invoked once per failed renewal.
	fn clear(&self);
}
