//! Thread-safe in-memory [`SessionStore`] holding bearer credentials.

// crates.io
use http::{
	HeaderValue,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	error::RenewalError,
	http::HttpResponse,
	request::OutboundRequest,
	session::{CredentialSecret, SessionStore},
};

type ClearHook = Arc<dyn Fn() + Send + Sync>;

/// Access + refresh pair issued at login and rotated by renewals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
	/// Credential attached to every API request as a bearer token.
	pub access_token: CredentialSecret,
	/// Credential exchanged at the renewal endpoint.
	pub refresh_token: Option<CredentialSecret>,
}
impl SessionCredential {
	/// Creates a credential pair.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: CredentialSecret::new(access_token),
			refresh_token: refresh_token.map(CredentialSecret::new),
		}
	}
}

#[derive(Deserialize)]
struct RenewalGrant {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RenewalBody<'a> {
	refresh_token: &'a str,
}

/// Session store that keeps the credential in-process.
///
/// API requests carry `Authorization: Bearer <access>`; the renewal call posts
/// `{"refresh_token": ...}` and expects `{"access_token": ..., "refresh_token"?: ...}` back.
/// A response without a refresh token keeps the previous one.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
	credential: Arc<RwLock<Option<SessionCredential>>>,
	on_clear: Option<ClearHook>,
}
impl MemorySessionStore {
	/// Creates a store already holding `credential`.
	pub fn with_credential(credential: SessionCredential) -> Self {
		Self { credential: Arc::new(RwLock::new(Some(credential))), on_clear: None }
	}

	/// Registers the embedding application's clear-session callback.
	pub fn with_clear_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_clear = Some(Arc::new(hook));

		self
	}

	/// Replaces the stored credential, starting a new session.
	pub fn login(&self, credential: SessionCredential) {
		*self.credential.write() = Some(credential);
	}

	/// Drops the stored credential without invoking the clear hook.
	pub fn logout(&self) {
		self.credential.write().take();
	}

	/// Returns a snapshot of the stored credential.
	pub fn credential(&self) -> Option<SessionCredential> {
		self.credential.read().clone()
	}
}
impl SessionStore for MemorySessionStore {
	fn attach(&self, request: &mut OutboundRequest) {
		let guard = self.credential.read();
		let Some(value) =
			guard.as_ref().and_then(|credential| credential.access_token.bearer_header())
		else {
			return;
		};

		request.headers.insert(AUTHORIZATION, value);
	}

	fn attach_renewal(&self, request: &mut OutboundRequest) -> Result<(), RenewalError> {
		let guard = self.credential.read();
		let refresh = guard
			.as_ref()
			.and_then(|credential| credential.refresh_token.as_ref())
			.ok_or(RenewalError::MissingCredential)?;
		let body = serde_json::to_vec(&RenewalBody { refresh_token: refresh.expose() })
			.map_err(|e| RenewalError::InvalidResponse { message: e.to_string() })?;

		request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		request.body = Some(body.into());

		Ok(())
	}

	fn absorb_renewal(&self, response: &HttpResponse) -> Result<(), RenewalError> {
		let grant = response.json::<RenewalGrant>().map_err(|e| {
			RenewalError::InvalidResponse { message: format!("{} at `{}`", e.inner(), e.path()) }
		})?;
		let access_token = CredentialSecret::new(grant.access_token);

		if access_token.is_blank() {
			return Err(RenewalError::InvalidResponse { message: "access token is blank".into() });
		}

		let mut guard = self.credential.write();
		let previous_refresh = guard.as_ref().and_then(|credential| credential.refresh_token.clone());

		*guard = Some(SessionCredential {
			access_token,
			refresh_token: grant
				.refresh_token
				.map(CredentialSecret::new)
				.filter(|refresh| !refresh.is_blank())
				.or(previous_refresh),
		});

		Ok(())
	}

	fn clear(&self) {
		self.credential.write().take();

		if let Some(hook) = &self.on_clear {
			hook();
		}
	}
}
impl Debug for MemorySessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemorySessionStore")
			.field("credential", &self.credential.read())
			.field("on_clear_set", &self.on_clear.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::{Method, StatusCode};
	// self
	use super::*;

	fn request() -> OutboundRequest {
		OutboundRequest::new(
			Method::GET,
			Url::parse("https://api.example.com/courses").expect("Request URL should parse."),
		)
	}

	#[test]
	fn attach_sets_sensitive_bearer_header() {
		let store = MemorySessionStore::with_credential(SessionCredential::new("access-1", None));
		let mut request = request();

		store.attach(&mut request);

		let value = request.headers.get(AUTHORIZATION).expect("Bearer header should be set.");

		assert_eq!(value.to_str().ok(), Some("Bearer access-1"));
		assert!(value.is_sensitive());
	}

	#[test]
	fn empty_store_attaches_nothing_and_cannot_renew() {
		let store = MemorySessionStore::default();
		let mut request = request();

		store.attach(&mut request);

		assert!(request.headers.get(AUTHORIZATION).is_none());
		assert_eq!(store.attach_renewal(&mut request), Err(RenewalError::MissingCredential));
	}

	#[test]
	fn absorb_keeps_refresh_token_when_not_rotated() {
		let store = MemorySessionStore::with_credential(SessionCredential::new(
			"access-old",
			Some("refresh-1".into()),
		));
		let response = HttpResponse::new(StatusCode::OK, "{\"access_token\":\"access-new\"}");

		store.absorb_renewal(&response).expect("Renewal grant should be absorbed.");

		let credential = store.credential().expect("Credential should remain stored.");

		assert_eq!(credential.access_token.expose(), "access-new");
		assert_eq!(credential.refresh_token.as_ref().map(CredentialSecret::expose), Some("refresh-1"));
	}

	#[test]
	fn absorb_rejects_malformed_grants() {
		let store = MemorySessionStore::default();
		let response = HttpResponse::new(StatusCode::OK, "{\"token\":1}");
		let err = store.absorb_renewal(&response).expect_err("Grant without access token must fail.");

		assert!(matches!(err, RenewalError::InvalidResponse { .. }));
	}

	#[test]
	fn blank_grants_keep_the_previous_credential() {
		let store = MemorySessionStore::with_credential(SessionCredential::new(
			"access-old",
			Some("refresh-1".into()),
		));
		let response = HttpResponse::new(StatusCode::OK, "{\"access_token\":\" \"}");
		let err = store.absorb_renewal(&response).expect_err("A blank access token must fail.");

		assert!(matches!(err, RenewalError::InvalidResponse { .. }));
		assert_eq!(
			store.credential().map(|credential| credential.access_token),
			Some(CredentialSecret::new("access-old"))
		);

		let response = HttpResponse::new(
			StatusCode::OK,
			"{\"access_token\":\"access-new\",\"refresh_token\":\"\"}",
		);

		store.absorb_renewal(&response).expect("Grant with a usable access token should apply.");

		let credential = store.credential().expect("Credential should remain stored.");

		assert_eq!(credential.refresh_token.as_ref().map(CredentialSecret::expose), Some("refresh-1"));
	}

	#[test]
	fn clear_forgets_credential_and_fires_hook() {
		let cleared = Arc::new(AtomicUsize::new(0));
		let counter = cleared.clone();
		let store = MemorySessionStore::with_credential(SessionCredential::new("access", None))
			.with_clear_hook(move || {
				counter.fetch_add(1, Ordering::SeqCst);
			});

		store.clear();

		assert!(store.credential().is_none());
		assert_eq!(cleared.load(Ordering::SeqCst), 1);
	}
}
