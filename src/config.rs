//! Validated client configuration shared by the session client, renewer, and stream decoder.
//!
//! Configuration values are serde (de)serializable so embedding applications can load them
//! from their own settings files, then pass them through [`ClientConfigBuilder`] for
//! validation.

/// Builder API for assembling client configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable configuration consumed by [`SessionClient`](crate::client::SessionClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL that relative request targets are resolved against.
	pub base_url: Url,
	/// Endpoint receiving the `POST` that renews the session credential.
	pub renewal_endpoint: Url,
	/// Statuses that signal an expired or rejected credential.
	pub auth_failure_statuses: Vec<u16>,
	/// Event stream decoding settings.
	pub stream: StreamConfig,
}
impl ClientConfig {
	/// Creates a new builder rooted at the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Checks whether a response status should trigger credential renewal.
	pub fn is_auth_failure(&self, status: u16) -> bool {
		self.auth_failure_statuses.contains(&status)
	}

	/// Resolves a request target; absolute URLs are kept, paths are joined onto the base URL.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(target)
			.map_err(|source| ConfigError::InvalidTarget { target: target.to_owned(), source })
	}
}

/// Settings for the newline-delimited chat event protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
	/// Marker that starts every event line; one space after it is optional.
	pub event_prefix: String,
	/// Upper bound for a single protocol line, terminator excluded.
	pub max_line_bytes: usize,
}
impl StreamConfig {
	const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;
}
impl Default for StreamConfig {
	fn default() -> Self {
		Self { event_prefix: "data:".into(), max_line_bytes: Self::DEFAULT_MAX_LINE_BYTES }
	}
}
