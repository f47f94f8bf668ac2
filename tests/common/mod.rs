//! In-process transport fakes shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use bytes::Bytes;
use futures::{StreamExt, stream};
use session_transport::{
	config::ClientConfig,
	error::TransportError,
	http::{HttpResponse, StreamingResponse, Transport, TransportFuture},
	http_types::{HeaderMap, Method, StatusCode, header::AUTHORIZATION},
	obs::{ErrorReport, ErrorReporter, ReportError},
	request::OutboundRequest,
	session::{MemorySessionStore, SessionCredential},
	url::Url,
};
#[cfg(feature = "reqwest")] use session_transport::{http::ReqwestTransport, reqwest};
use tokio::sync::Barrier;

pub const BASE_URL: &str = "https://api.example.com/v1/";
pub const RENEWAL_PATH: &str = "/v1/auth/refresh";
pub const STALE: &str = "Bearer stale-access";
pub const FRESH: &str = "Bearer fresh-access";

/// Builds a reqwest transport that accepts the self-signed certificates served by `httpmock`.
#[cfg(feature = "reqwest")]
pub fn insecure_reqwest_transport() -> Arc<ReqwestTransport> {
	let builder = reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true);

	Arc::new(
		ReqwestTransport::try_from_builder(builder)
			.expect("Failed to build insecure Reqwest client for tests."),
	)
}

/// What the fake backend answers for one request.
pub struct Reply {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub chunks: Vec<Result<Bytes, TransportError>>,
}
impl Reply {
	pub fn new(status: StatusCode, body: &'static str) -> Self {
		Self::chunked(status, [body])
	}

	pub fn chunked<I>(status: StatusCode, chunks: I) -> Self
	where
		I: IntoIterator<Item = &'static str>,
	{
		Self {
			status,
			headers: HeaderMap::new(),
			chunks: chunks.into_iter().map(|chunk| Ok(Bytes::from_static(chunk.as_bytes()))).collect(),
		}
	}

	pub fn then_fail(mut self) -> Self {
		self.chunks.push(Err(TransportError::Io(std::io::Error::new(
			std::io::ErrorKind::ConnectionReset,
			"connection reset mid-stream",
		))));

		self
	}
}

/// Snapshot of one request seen by the fake backend.
#[derive(Clone, Debug)]
pub struct Seen {
	pub method: Method,
	pub path: String,
	pub authorization: Option<String>,
	pub body: Option<Bytes>,
}

type Handler = Box<dyn Fn(&Seen) -> Result<Reply, TransportError> + Send + Sync>;

/// Transport answering from a closure; requests carrying the stale credential can be held
/// until a fixed number of them has arrived, so concurrent callers observe the same epoch.
pub struct FakeTransport {
	handler: Handler,
	rendezvous: Option<Barrier>,
	seen: Mutex<Vec<Seen>>,
}
impl FakeTransport {
	pub fn new(handler: impl Fn(&Seen) -> Result<Reply, TransportError> + Send + Sync + 'static) -> Self {
		Self { handler: Box::new(handler), rendezvous: None, seen: Mutex::new(Vec::new()) }
	}

	pub fn hold_stale_until(mut self, callers: usize) -> Self {
		self.rendezvous = Some(Barrier::new(callers));

		self
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().expect("Request log lock should not be poisoned.").clone()
	}

	pub fn renewal_calls(&self) -> usize {
		self.seen().iter().filter(|seen| seen.path == RENEWAL_PATH).count()
	}

	pub fn api_calls(&self) -> usize {
		self.seen().iter().filter(|seen| seen.path != RENEWAL_PATH).count()
	}

	async fn reply(&self, request: &OutboundRequest) -> Result<StreamingResponse, TransportError> {
		let seen = Seen {
			method: request.method.clone(),
			path: request.url.path().to_owned(),
			authorization: request
				.headers
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			body: request.body.clone(),
		};

		self.seen.lock().expect("Request log lock should not be poisoned.").push(seen.clone());

		if let Some(barrier) = &self.rendezvous {
			if seen.authorization.as_deref() == Some(STALE) {
				barrier.wait().await;
			}
		}

		let reply = (self.handler)(&seen)?;

		Ok(StreamingResponse {
			status: reply.status,
			headers: reply.headers,
			body: stream::iter(reply.chunks).boxed(),
		})
	}
}
impl Transport for FakeTransport {
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a, HttpResponse> {
		Box::pin(async move { self.reply(request).await?.collect().await })
	}

	fn open_stream<'a>(
		&'a self,
		request: &'a OutboundRequest,
	) -> TransportFuture<'a, StreamingResponse> {
		Box::pin(self.reply(request))
	}
}

/// Backend that accepts only the fresh credential and rotates stale ones on renewal.
pub fn rotating_backend(renewal_status: StatusCode) -> FakeTransport {
	FakeTransport::new(move |seen| {
		if seen.path == RENEWAL_PATH {
			return Ok(if renewal_status.is_success() {
				Reply::new(renewal_status, "{\"access_token\":\"fresh-access\"}")
			} else {
				Reply::new(renewal_status, "{\"error\":\"invalid_grant\"}")
			});
		}

		match seen.authorization.as_deref() {
			Some(FRESH) => Ok(Reply::new(StatusCode::OK, "{\"courses\":[]}")),
			_ => Ok(Reply::new(StatusCode::UNAUTHORIZED, "")),
		}
	})
}

pub fn config() -> ClientConfig {
	ClientConfig::builder(Url::parse(BASE_URL).expect("Base URL fixture should parse."))
		.renewal_endpoint("auth/refresh")
		.build()
		.expect("Client config fixture should build.")
}

/// Store seeded with the stale credential; the returned counter tracks clear-hook calls.
pub fn stale_store() -> (Arc<MemorySessionStore>, Arc<AtomicUsize>) {
	let cleared = Arc::new(AtomicUsize::new(0));
	let counter = cleared.clone();
	let store = MemorySessionStore::with_credential(SessionCredential::new(
		"stale-access",
		Some("refresh-1".into()),
	))
	.with_clear_hook(move || {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	(Arc::new(store), cleared)
}

/// Reporter that records every report, optionally failing after recording it.
#[derive(Default)]
pub struct RecordingReporter {
	pub reports: Mutex<Vec<ErrorReport>>,
	pub fail: bool,
}
impl RecordingReporter {
	pub fn failing() -> Self {
		Self { reports: Mutex::default(), fail: true }
	}

	pub fn reports(&self) -> Vec<ErrorReport> {
		self.reports.lock().expect("Report log lock should not be poisoned.").clone()
	}
}
impl ErrorReporter for RecordingReporter {
	fn report(&self, report: ErrorReport) -> Result<(), ReportError> {
		self.reports.lock().expect("Report log lock should not be poisoned.").push(report);

		if self.fail { Err("telemetry collector is offline".into()) } else { Ok(()) }
	}
}
