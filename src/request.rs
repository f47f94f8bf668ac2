//! Request descriptors owned by a single logical call.
//!
//! A [`RequestDescriptor`] is what callers hand to the session client. It is never mutated
//! while in flight: each dispatch materializes a fresh [`OutboundRequest`] that the session
//! store decorates with credentials, and the one permitted resend is produced by
//! [`RequestDescriptor::into_retry`], which refuses to run twice.

// crates.io
use http::{
	HeaderMap, HeaderValue, Method,
	header::{CONTENT_TYPE, HeaderName},
};
// self
use crate::{_prelude::*, config::ClientConfig, error::ConfigError};

/// Caller-owned description of an API call.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL or path relative to the configured base URL.
	pub target: String,
	/// Caller-supplied headers; credentials are attached separately per dispatch.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Bytes>,
	retried: bool,
}
impl RequestDescriptor {
	/// Creates a descriptor for the provided method and target.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` descriptor.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// Shorthand for a `POST` descriptor.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// Shorthand for a `PUT` descriptor.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// Shorthand for a `PATCH` descriptor.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// Shorthand for a `DELETE` descriptor.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds or replaces a typed header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Adds or replaces a header from raw strings.
	pub fn try_header(self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let invalid = || ConfigError::InvalidHeader { name: name.to_owned() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		Ok(self.with_header(header_name, header_value))
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets the content type.
	pub fn with_json<T>(self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value)?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}

	/// Returns `true` once the descriptor has been resent after a renewal.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Produces the single permitted resend, or `None` if this descriptor was already resent.
	pub fn into_retry(self) -> Option<Self> {
		if self.retried { None } else { Some(Self { retried: true, ..self }) }
	}

	/// Materializes a dispatchable request against `config`'s base URL.
	pub fn prepare(&self, config: &ClientConfig) -> Result<OutboundRequest, ConfigError> {
		let url = config.resolve(&self.target)?;

		Ok(OutboundRequest {
			method: self.method.clone(),
			url,
			headers: self.headers.clone(),
			body: self.body.clone(),
		})
	}
}

/// Fully resolved request handed to a [`Transport`](crate::http::Transport).
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Resolved absolute URL.
	pub url: Url,
	/// Headers, including any credentials attached by the session store.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Bytes>,
}
impl OutboundRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}
}
