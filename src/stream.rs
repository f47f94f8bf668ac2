//! Incremental decoding of the chat endpoint's newline-delimited event stream.
//!
//! The wire protocol is one event per line, `data: {json}`, with blank lines between
//! events. The JSON object carries exactly one of an incremental `token`, a truthy `done`
//! marker (the whole object is the final payload), or an `error` message.
//! [`StreamSession`] turns arbitrary byte chunks into [`StreamEvent`]s; the dispatched
//! sequence is identical no matter how the same bytes are chunked.

pub mod decoder;

pub use decoder::*;

// self
use crate::_prelude::*;

/// Event dispatched to a stream consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
	/// Incremental text.
	Token(String),
	/// Terminal success; carries the whole final object.
	Done(serde_json::Value),
	/// Terminal failure.
	Error(String),
}
impl StreamEvent {
	/// Returns true if this event ends the session (`Done` or `Error`).
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Done(_) | Self::Error(_))
	}

	/// Convenience accessor for `Token` contents.
	pub fn as_token(&self) -> Option<&str> {
		match self {
			Self::Token(text) => Some(text),
			_ => None,
		}
	}
}

/// Caller-supplied consumer of stream events.
pub trait EventSink {
	/// Receives the next event, in wire order.
	fn dispatch(&mut self, event: StreamEvent);
}
impl<F> EventSink for F
where
	F: FnMut(StreamEvent),
{
	fn dispatch(&mut self, event: StreamEvent) {
		self(event)
	}
}

/// How a stream consumption ended when it did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEnd {
	/// The server dispatched its terminal `Done` event.
	Done(serde_json::Value),
	/// The session's cancel latch was set before a terminal event arrived.
	Cancelled,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn closures_are_event_sinks() {
		let mut seen = Vec::new();
		let mut sink = |event: StreamEvent| seen.push(event);

		sink.dispatch(StreamEvent::Token("hi".into()));
		sink.dispatch(StreamEvent::Error("boom".into()));

		assert_eq!(seen.len(), 2);
		assert_eq!(seen[0].as_token(), Some("hi"));
		assert!(!seen[0].is_terminal());
		assert!(seen[1].is_terminal());
	}
}
