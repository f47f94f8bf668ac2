//! Session credential material that never reaches logs or headers unmarked.

// crates.io
use http::HeaderValue;
// self
use crate::_prelude::*;

/// Access or refresh credential held by a session store.
///
/// Formatting always prints `<redacted>`. Headers built from it are flagged sensitive so
/// `http` and `reqwest` keep them out of their own debug output as well.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSecret(String);
impl CredentialSecret {
	/// Wraps a credential string as issued by the backend.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the backend handed out an empty or whitespace-only credential.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// Builds a sensitive `Bearer <credential>` header value.
	///
	/// `None` for blank credentials and for credentials carrying bytes that are not legal in
	/// a header, so a malformed grant never produces a half-formed `Authorization` header.
	pub fn bearer_header(&self) -> Option<HeaderValue> {
		if self.is_blank() {
			return None;
		}

		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0)).ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
impl AsRef<str> for CredentialSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for CredentialSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialSecret(<redacted>)")
	}
}
impl Display for CredentialSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
