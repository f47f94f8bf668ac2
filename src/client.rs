//! Public entry point: credential attachment, one-shot renewal retries, and stream driving.
//!
//! [`SessionClient::send`] dispatches a [`RequestDescriptor`] through the configured
//! [`Transport`]. When the response signals an authentication failure the client waits for
//! the shared renewal (see [`RenewalCoordinator`]) and resends the descriptor exactly once;
//! a second authentication failure is terminal. Server errors are reported to the
//! [`ErrorReporter`] and surfaced as [`Error::Http`]; every other response passes through.
//!
//! [`SessionClient::stream`] applies the same rules to the response head of a streaming
//! call, then feeds body chunks into a [`StreamSession`] and dispatches its events.

// std
use std::panic::{self, AssertUnwindSafe};
// crates.io
use futures::StreamExt;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::{ExpiryCause, StreamError},
	http::{HttpResponse, StreamingResponse, Transport},
	obs::{self, CallKind, CallOutcome, CallSpan, ErrorReport, ErrorReporter, NoopReporter},
	renewal::{HttpRenewer, RenewalCoordinator},
	request::{OutboundRequest, RequestDescriptor},
	session::SessionStore,
	stream::{EventSink, StreamEnd, StreamSession, Terminal},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// Session-aware API client.
///
/// Cloning is cheap; clones share the transport, session store, and renewal coordinator, so
/// concurrent calls from any clone collapse onto the same renewal.
pub struct SessionClient<T>
where
	T: ?Sized + Transport,
{
	/// Transport used for every API and renewal request.
	pub transport: Arc<T>,
	/// Store that attaches and clears the session credential.
	pub store: Arc<dyn SessionStore>,
	/// Single-flight renewal coordinator.
	pub coordinator: Arc<RenewalCoordinator>,
	/// Telemetry port for server errors.
	pub reporter: Arc<dyn ErrorReporter>,
	/// Validated client configuration.
	pub config: Arc<ClientConfig>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client that renews through [`HttpRenewer`] on the same transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn SessionStore>,
		transport: Arc<T>,
	) -> Self {
		let renewer =
			HttpRenewer::new(transport.clone(), store.clone(), config.renewal_endpoint.clone());
		let coordinator = Arc::new(RenewalCoordinator::new(Arc::new(renewer), store.clone()));

		Self::with_coordinator(config, store, transport, coordinator)
	}

	/// Creates a client around a caller-provided coordinator (e.g. one with a fake renewer).
	pub fn with_coordinator(
		config: ClientConfig,
		store: Arc<dyn SessionStore>,
		transport: Arc<T>,
		coordinator: Arc<RenewalCoordinator>,
	) -> Self {
		Self {
			transport,
			store,
			coordinator,
			reporter: Arc::new(NoopReporter),
			config: Arc::new(config),
		}
	}

	/// Replaces the telemetry port.
	pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
		self.reporter = reporter;

		self
	}

	/// Sends `request`, renewing the credential and resending once on authentication failure.
	pub async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse> {
		const KIND: CallKind = CallKind::Send;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = CallSpan::new(KIND, "send").instrument(self.send_once_renewed(request)).await;

		record_result(KIND, &result);

		result
	}

	/// Opens a streaming call and dispatches its events to `sink` until a terminal event,
	/// stream close, or cancellation.
	pub async fn stream<S>(&self, request: RequestDescriptor, sink: S) -> Result<StreamEnd>
	where
		S: EventSink,
	{
		self.stream_with(request, self.stream_session(), sink).await
	}

	/// Like [`stream`](Self::stream), driving a caller-created session so the caller can keep
	/// its [`CancelHandle`](crate::stream::CancelHandle).
	pub async fn stream_with<S>(
		&self,
		request: RequestDescriptor,
		session: StreamSession,
		sink: S,
	) -> Result<StreamEnd>
	where
		S: EventSink,
	{
		const KIND: CallKind = CallKind::Stream;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result =
			CallSpan::new(KIND, "stream").instrument(self.drive(request, session, sink)).await;

		record_result(KIND, &result);

		result
	}

	/// Creates a decoder session using the configured stream settings.
	pub fn stream_session(&self) -> StreamSession {
		StreamSession::new(self.config.stream.clone())
	}

	async fn send_once_renewed(&self, request: RequestDescriptor) -> Result<HttpResponse> {
		let epoch = self.coordinator.epoch();
		let (outbound, response) = self.execute(&request).await?;
		let Some(status) = self.auth_failure(&response.status) else {
			return self.settle(&outbound, response);
		};
		let retry = self.renew_for_retry(request, epoch, status).await?;
		let (outbound, response) = self.execute(&retry).await?;

		if let Some(status) = self.auth_failure(&response.status) {
			return Err(Error::expired(ExpiryCause::RejectedAfterRenewal { status }));
		}

		self.settle(&outbound, response)
	}

	async fn open_once_renewed(&self, request: RequestDescriptor) -> Result<StreamingResponse> {
		let epoch = self.coordinator.epoch();
		let (outbound, response) = self.open(&request).await?;
		let Some(status) = self.auth_failure(&response.status) else {
			return self.settle_stream(&outbound, response).await;
		};
		let retry = self.renew_for_retry(request, epoch, status).await?;
		let (outbound, response) = self.open(&retry).await?;

		if let Some(status) = self.auth_failure(&response.status) {
			return Err(Error::expired(ExpiryCause::RejectedAfterRenewal { status }));
		}

		self.settle_stream(&outbound, response).await
	}

	async fn drive<S>(
		&self,
		request: RequestDescriptor,
		mut session: StreamSession,
		mut sink: S,
	) -> Result<StreamEnd>
	where
		S: EventSink,
	{
		let mut body = self.open_once_renewed(request).await?.body;
		let mut body_error = None;
		let mut terminal_dispatched = false;

		while !session.is_terminated() {
			let events = match body.next().await {
				Some(Ok(chunk)) => session.feed(&chunk),
				Some(Err(e)) => {
					let events: Vec<_> = session.fail(e.to_string()).into_iter().collect();

					body_error = Some(e);

					events
				},
				None => session.close(),
			};

			for event in events {
				if session.is_cancelled() {
					break;
				}

				terminal_dispatched = event.is_terminal();

				sink.dispatch(event);
			}
		}

		if session.is_cancelled() && !terminal_dispatched {
			return Ok(StreamEnd::Cancelled);
		}

		match session.terminal() {
			None => Ok(StreamEnd::Cancelled),
			Some(Terminal::Done(payload)) => Ok(StreamEnd::Done(payload.clone())),
			Some(Terminal::ServerError(message)) =>
				Err(StreamError::Server { message: message.clone() }.into()),
			Some(Terminal::Closed) => Err(StreamError::UnexpectedClose.into()),
			Some(Terminal::Overflow { limit }) => Err(StreamError::LineTooLong { limit: *limit }.into()),
			Some(Terminal::Failed(_)) => match body_error {
				Some(source) => Err(StreamError::Body { source }.into()),
				None => Err(StreamError::UnexpectedClose.into()),
			},
		}
	}

	async fn execute(&self, request: &RequestDescriptor) -> Result<(OutboundRequest, HttpResponse)> {
		let outbound = self.prepare(request)?;
		let response = self.transport.execute(&outbound).await?;

		Ok((outbound, response))
	}

	async fn open(
		&self,
		request: &RequestDescriptor,
	) -> Result<(OutboundRequest, StreamingResponse)> {
		let outbound = self.prepare(request)?;
		let response = self.transport.open_stream(&outbound).await?;

		Ok((outbound, response))
	}

	fn prepare(&self, request: &RequestDescriptor) -> Result<OutboundRequest> {
		let mut outbound = request.prepare(&self.config)?;

		self.store.attach(&mut outbound);

		Ok(outbound)
	}

	fn auth_failure(&self, status: &http::StatusCode) -> Option<u16> {
		let status = status.as_u16();

		self.config.is_auth_failure(status).then_some(status)
	}

	async fn renew_for_retry(
		&self,
		request: RequestDescriptor,
		epoch: u64,
		status: u16,
	) -> Result<RequestDescriptor> {
		let retry = request
			.into_retry()
			.ok_or_else(|| Error::expired(ExpiryCause::RejectedAfterRenewal { status }))?;

		self.coordinator.ensure_valid_credential_since(epoch).await?;

		Ok(retry)
	}

	fn settle(&self, outbound: &OutboundRequest, response: HttpResponse) -> Result<HttpResponse> {
		if response.status.is_server_error() {
			self.report(outbound, &response);

			return Err(http_error(response));
		}

		Ok(response)
	}

	async fn settle_stream(
		&self,
		outbound: &OutboundRequest,
		response: StreamingResponse,
	) -> Result<StreamingResponse> {
		if response.status.is_success() {
			return Ok(response);
		}

		let response = response.collect().await?;

		if response.status.is_server_error() {
			self.report(outbound, &response);
		}

		Err(http_error(response))
	}

	fn report(&self, outbound: &OutboundRequest, response: &HttpResponse) {
		let report = ErrorReport {
			status: response.status.as_u16(),
			url: outbound.url.clone(),
			method: outbound.method.clone(),
			body: response.text().into_owned(),
		};
		let reporter = self.reporter.clone();

		match panic::catch_unwind(AssertUnwindSafe(move || reporter.report(report))) {
			Ok(Ok(())) => {},
			Ok(Err(e)) => obs::log_report_failure(&e),
			Err(_) => obs::log_report_failure(&"reporter panicked"),
		}
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Self {
		Self::with_transport(config, store, Arc::new(ReqwestTransport::default()))
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			reporter: self.reporter.clone(),
			config: self.config.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

fn http_error(response: HttpResponse) -> Error {
	Error::Http {
		status: response.status.as_u16(),
		retry_after: response.retry_after(),
		body: response.body,
	}
}

fn record_result<T>(kind: CallKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
		Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
	}
}
