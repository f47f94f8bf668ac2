//! Transport primitives for session-aware API calls.
//!
//! The module exposes [`Transport`], the crate's only dependency on an HTTP stack, along
//! with the buffered [`HttpResponse`] and incremental [`StreamingResponse`] it produces.
//! The session client never retries, caches, or pools on its own; everything beyond
//! "issue one request, hand back status + headers + body" belongs to the transport.

// std
use std::borrow::Cow;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use futures::StreamExt;
use futures::{TryStreamExt, stream::BoxStream};
use http::{
	HeaderMap, StatusCode,
	header::RETRY_AFTER,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError, request::OutboundRequest};

/// Boxed future returned by [`Transport`] calls.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Body of a streaming response, delivered in arbitrary chunks until the stream ends.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Abstraction over HTTP stacks capable of issuing one request at a time.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared between the
/// session client and the renewer behind an `Arc`, and the futures they return must be
/// `Send` so callers can hop executors.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Issues `request` and buffers the whole response body.
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a, HttpResponse>;

	/// Issues `request` and returns as soon as the response head arrives; the body is read
	/// incrementally.
	fn open_stream<'a>(
		&'a self,
		request: &'a OutboundRequest,
	) -> TransportFuture<'a, StreamingResponse>;
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Bytes,
}
impl HttpResponse {
	/// Creates a response with the provided status and body and no headers.
	pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns the body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Deserializes the body as JSON, keeping the path of the first mismatch.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Retry-After hint expressed as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Response whose body is still arriving.
pub struct StreamingResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Incremental body.
	pub body: ByteStream,
}
impl StreamingResponse {
	/// Drains the body into a buffered [`HttpResponse`].
	pub async fn collect(self) -> Result<HttpResponse, TransportError> {
		let Self { status, headers, body } = self;
		let chunks: Vec<Bytes> = body.try_collect().await?;

		Ok(HttpResponse { status, headers, body: Bytes::from(chunks.concat()) })
	}
}
impl Debug for StreamingResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamingResponse")
			.field("status", &self.status)
			.field("headers", &self.headers)
			.finish_non_exhaustive()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds the transport from a reqwest client builder.
	pub fn try_from_builder(
		builder: reqwest::ClientBuilder,
	) -> Result<Self, crate::error::ConfigError> {
		Ok(Self(builder.build()?))
	}

	fn request(&self, request: &OutboundRequest) -> reqwest::RequestBuilder {
		let builder = self
			.0
			.request(request.method.clone(), request.url.clone())
			.headers(request.headers.clone());

		match &request.body {
			Some(body) => builder.body(body.clone()),
			None => builder,
		}
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a, HttpResponse> {
		Box::pin(async move {
			let response = self.request(request).send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?;

			Ok(HttpResponse { status, headers, body })
		})
	}

	fn open_stream<'a>(
		&'a self,
		request: &'a OutboundRequest,
	) -> TransportFuture<'a, StreamingResponse> {
		Box::pin(async move {
			let response = self.request(request).send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes_stream().map_err(TransportError::from).boxed();

			Ok(StreamingResponse { status, headers, body })
		})
	}
}

/// Parses a `Retry-After` header expressed either in seconds or as an RFC 2822 date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
