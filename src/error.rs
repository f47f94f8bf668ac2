//! Transport-level error types shared by the session client, renewal coordinator, and stream
//! decoder.

// self
use crate::{_prelude::*, config::ClientConfigError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by [`SessionClient`](crate::client::SessionClient) calls.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response reached the client (DNS, TCP, TLS, I/O).
	#[error(transparent)]
	Network(#[from] TransportError),
	/// A response arrived but its status signals a failure unrelated to authentication.
	#[error("Server responded with HTTP {status}.")]
	Http {
		/// HTTP status code of the failed response.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Buffered response body.
		body: Bytes,
	},
	/// Authentication failed after one renewal attempt, or the renewal itself failed.
	#[error("Session credential has expired.")]
	AuthenticationExpired {
		/// Why the session could not be recovered.
		#[source]
		cause: ExpiryCause,
	},
	/// The event stream ended with a server-signaled error or without a terminal event.
	#[error(transparent)]
	Stream(#[from] StreamError),
}
impl Error {
	/// Returns `true` when the embedding application should send the user back to login.
	pub fn is_authentication_expired(&self) -> bool {
		matches!(self, Self::AuthenticationExpired { .. })
	}

	/// Returns the HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			Self::AuthenticationExpired { cause: ExpiryCause::RejectedAfterRenewal { status } } =>
				Some(*status),
			Self::AuthenticationExpired {
				cause: ExpiryCause::RenewalFailed(RenewalError::Rejected { status }),
			} => Some(*status),
			_ => None,
		}
	}

	pub(crate) fn expired(cause: impl Into<ExpiryCause>) -> Self {
		Self::AuthenticationExpired { cause: cause.into() }
	}
}

/// Reason attached to [`Error::AuthenticationExpired`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ExpiryCause {
	/// The shared renewal call failed; every attached caller observes the same failure.
	#[error("Credential renewal failed.")]
	RenewalFailed(#[from] RenewalError),
	/// The request was rejected again after it had already been retried once.
	#[error("Request was rejected with HTTP {status} after the credential was renewed.")]
	RejectedAfterRenewal {
		/// Status of the second authentication failure.
		status: u16,
	},
}

/// Failure of a single renewal call.
///
/// The value is cloned into every waiter attached to the shared renewal, hence the
/// `String` payloads instead of boxed sources.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalError {
	/// Renewal endpoint answered with a non-success status.
	#[error("Renewal endpoint rejected the credential with HTTP {status}.")]
	Rejected {
		/// HTTP status returned by the renewal endpoint.
		status: u16,
	},
	/// Renewal endpoint could not be reached.
	#[error("Renewal endpoint is unreachable: {message}.")]
	Unreachable {
		/// Transport failure summary.
		message: String,
	},
	/// The session store holds nothing that could be renewed.
	#[error("No renewable credential is available.")]
	MissingCredential,
	/// Renewal succeeded on the wire but the session store could not apply the response.
	#[error("Renewal response could not be applied: {message}.")]
	InvalidResponse {
		/// Parsing or validation failure summary.
		message: String,
	},
	/// The renewal future panicked before it settled.
	#[error("Renewal was interrupted before it settled.")]
	Interrupted,
}
impl RenewalError {
	/// Returns a stable cause label suitable for span or metric fields.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Rejected { .. } => "rejected",
			Self::Unreachable { .. } => "unreachable",
			Self::MissingCredential => "missing_credential",
			Self::InvalidResponse { .. } => "invalid_response",
			Self::Interrupted => "interrupted",
		}
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Client configuration failed validation.
	#[error(transparent)]
	Client(#[from] ClientConfigError),
	/// Request target cannot be resolved against the base URL.
	#[error("Request target `{target}` cannot be resolved against the base URL.")]
	InvalidTarget {
		/// Target that failed to resolve.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name or value is not valid HTTP.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	InvalidBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures where no response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while dispatching the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while dispatching the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures that end a single stream session without affecting other sessions.
#[derive(Debug, ThisError)]
pub enum StreamError {
	/// The server dispatched an error event.
	#[error("Server signaled a stream error: {message}.")]
	Server {
		/// Message carried by the error event.
		message: String,
	},
	/// The body ended before a terminal event arrived.
	#[error("Stream closed before a terminal event was received.")]
	UnexpectedClose,
	/// A single protocol line grew past the configured limit.
	#[error("Event line exceeded {limit} bytes.")]
	LineTooLong {
		/// Configured per-line byte limit.
		limit: usize,
	},
	/// The body failed while chunks were still arriving.
	#[error("Stream body failed mid-flight.")]
	Body {
		/// Transport failure raised by the body stream.
		#[source]
		source: TransportError,
	},
}
