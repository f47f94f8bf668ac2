//! Line-buffering decoder state for one streaming call.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{_prelude::*, config::StreamConfig, obs, stream::StreamEvent};

const UNEXPECTED_CLOSE: &str = "stream closed unexpectedly";

/// A single protocol line that could not be turned into an event.
///
/// Recovered locally: the line is logged and skipped, the session keeps going.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// The line is not valid UTF-8.
	#[error("Event line is not valid UTF-8.")]
	Utf8(#[from] std::str::Utf8Error),
	/// The payload after the prefix is not JSON.
	#[error("Event payload is not valid JSON.")]
	Json(#[from] serde_json::Error),
	/// The payload is JSON but not an object.
	#[error("Event payload is not a JSON object.")]
	NotAnObject,
	/// A known field carries the wrong type.
	#[error("Event payload has an invalid field.")]
	Field(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The object carries none of `token`, `done`, or `error`.
	#[error("Event payload carries no token, done marker, or error.")]
	Unrecognized,
}

/// Why a session stopped processing bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum Terminal {
	/// A `Done` event was dispatched.
	Done(serde_json::Value),
	/// The server dispatched an error event.
	ServerError(String),
	/// The transport closed before a terminal event.
	Closed,
	/// A line grew past the configured limit.
	Overflow {
		/// Configured per-line byte limit.
		limit: usize,
	},
	/// The body failed mid-flight.
	Failed(String),
}

#[derive(Debug, Default)]
struct Latch {
	terminated: AtomicBool,
	cancelled: AtomicBool,
}

/// Latch shared with a [`StreamSession`]; cancelling has the same effect as a terminal event.
///
/// Cancellation is tracked separately from termination, so a consumer can tell an external
/// stop apart from a terminal event even when both happen within one chunk.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<Latch>);
impl CancelHandle {
	/// Stops the session; later chunks are ignored and nothing more is dispatched.
	pub fn cancel(&self) {
		self.0.cancelled.store(true, Ordering::Release);
		self.0.terminated.store(true, Ordering::Release);
	}

	/// Returns `true` once [`cancel`](Self::cancel) was called.
	pub fn is_cancelled(&self) -> bool {
		self.0.cancelled.load(Ordering::Acquire)
	}

	/// Returns `true` once the session has stopped for any reason.
	pub fn is_terminated(&self) -> bool {
		self.0.terminated.load(Ordering::Acquire)
	}
}

/// Decoder state for exactly one streaming call.
#[derive(Debug)]
pub struct StreamSession {
	config: StreamConfig,
	buffer: Vec<u8>,
	latch: Arc<Latch>,
	terminal: Option<Terminal>,
}
impl StreamSession {
	/// Creates an empty session.
	pub fn new(config: StreamConfig) -> Self {
		Self { config, buffer: Vec::new(), latch: Default::default(), terminal: None }
	}

	/// Returns a handle that can stop this session from elsewhere.
	pub fn cancel_handle(&self) -> CancelHandle {
		CancelHandle(self.latch.clone())
	}

	/// Returns `true` once a terminal event was dispatched or the session was cancelled.
	pub fn is_terminated(&self) -> bool {
		self.latch.terminated.load(Ordering::Acquire)
	}

	/// Returns `true` once a [`CancelHandle`] stopped the session, even if a terminal event
	/// had already been decoded.
	pub fn is_cancelled(&self) -> bool {
		self.latch.cancelled.load(Ordering::Acquire)
	}

	/// Returns the terminal event decoded so far; `None` while running or when cancelled
	/// before any terminal line arrived.
	pub fn terminal(&self) -> Option<&Terminal> {
		self.terminal.as_ref()
	}

	/// Appends `chunk` and returns the events completed by it.
	///
	/// Complete lines are consumed from the front of the buffer; a trailing partial line
	/// waits for the next call. Once terminated this is a no-op.
	pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
		let mut events = Vec::new();

		if self.is_terminated() {
			return events;
		}

		self.buffer.extend_from_slice(chunk);

		let mut consumed = 0;

		while let Some(offset) = self.buffer[consumed..].iter().position(|byte| *byte == b'\n') {
			let end = consumed + offset;
			let limit = self.config.max_line_bytes;

			if offset > limit {
				events.push(self.finish(Terminal::Overflow { limit }, overflow_message(limit)));

				return events;
			}

			let decoded = decode_line(&self.config.event_prefix, &self.buffer[consumed..end]);

			consumed = end + 1;

			if let Some(event) = self.accept(decoded) {
				let terminal = event.is_terminal();

				events.push(event);

				if terminal {
					return events;
				}
			}
		}

		self.buffer.drain(..consumed);

		if self.buffer.len() > self.config.max_line_bytes {
			let limit = self.config.max_line_bytes;

			events.push(self.finish(Terminal::Overflow { limit }, overflow_message(limit)));
		}

		events
	}

	/// Handles end-of-stream.
	///
	/// A residual unterminated line is decoded first; if the session is still running
	/// afterwards it ends with `Error("stream closed unexpectedly")`.
	pub fn close(&mut self) -> Vec<StreamEvent> {
		let mut events = Vec::new();

		if self.is_terminated() {
			return events;
		}

		let residual = std::mem::take(&mut self.buffer);

		if !residual.is_empty() {
			let decoded = decode_line(&self.config.event_prefix, &residual);

			events.extend(self.accept(decoded));
		}
		if !self.is_terminated() {
			events.push(self.finish(Terminal::Closed, UNEXPECTED_CLOSE.into()));
		}

		events
	}

	/// Ends the session because the body failed; returns the error event to dispatch.
	pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
		if self.is_terminated() {
			return None;
		}

		let message = message.into();

		Some(self.finish(Terminal::Failed(message.clone()), message))
	}

	fn accept(&mut self, decoded: Result<Option<StreamEvent>, DecodeError>) -> Option<StreamEvent> {
		match decoded {
			Ok(Some(StreamEvent::Done(payload))) =>
				Some(self.terminate(Terminal::Done(payload.clone()), StreamEvent::Done(payload))),
			Ok(Some(StreamEvent::Error(message))) => Some(
				self.terminate(Terminal::ServerError(message.clone()), StreamEvent::Error(message)),
			),
			Ok(event) => event,
			Err(e) => {
				obs::log_skipped_line(&e);

				None
			},
		}
	}

	fn finish(&mut self, terminal: Terminal, message: String) -> StreamEvent {
		self.terminate(terminal, StreamEvent::Error(message))
	}

	fn terminate(&mut self, terminal: Terminal, event: StreamEvent) -> StreamEvent {
		self.terminal = Some(terminal);
		self.buffer = Vec::new();
		self.latch.terminated.store(true, Ordering::Release);

		event
	}
}
impl Default for StreamSession {
	fn default() -> Self {
		Self::new(StreamConfig::default())
	}
}

#[derive(Deserialize)]
struct EventPayload {
	#[serde(default)]
	token: Option<String>,
	#[serde(default)]
	done: Option<bool>,
	#[serde(default)]
	error: Option<serde_json::Value>,
}

fn decode_line(prefix: &str, raw: &[u8]) -> Result<Option<StreamEvent>, DecodeError> {
	let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

	if raw.is_empty() {
		return Ok(None);
	}

	let line = std::str::from_utf8(raw)?;
	let Some(rest) = line.strip_prefix(prefix) else {
		return Ok(None);
	};
	let data = rest.strip_prefix(' ').unwrap_or(rest);
	let value: serde_json::Value = serde_json::from_str(data)?;

	if !value.is_object() {
		return Err(DecodeError::NotAnObject);
	}

	let payload: EventPayload = serde_path_to_error::deserialize(&value)?;

	if let Some(error) = payload.error.filter(|error| !error.is_null()) {
		return Ok(Some(StreamEvent::Error(error_message(error))));
	}
	if payload.done == Some(true) {
		return Ok(Some(StreamEvent::Done(value)));
	}

	match payload.token {
		Some(token) => Ok(Some(StreamEvent::Token(token))),
		None => Err(DecodeError::Unrecognized),
	}
}

fn error_message(error: serde_json::Value) -> String {
	match error {
		serde_json::Value::String(message) => message,
		serde_json::Value::Object(ref fields) => match fields.get("message") {
			Some(serde_json::Value::String(message)) => message.clone(),
			_ => error.to_string(),
		},
		other => other.to_string(),
	}
}

fn overflow_message(limit: usize) -> String {
	format!("event line exceeds {limit} bytes")
}
