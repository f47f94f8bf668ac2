mod common;

// std
use std::sync::{Arc, atomic::Ordering};
// crates.io
use session_transport::{
	client::SessionClient,
	error::{Error, ExpiryCause, RenewalError, TransportError},
	http_types::{HeaderValue, Method, StatusCode, header::RETRY_AFTER},
	request::RequestDescriptor,
	session::CredentialSecret,
};
use time::Duration;
// self
use common::*;

#[tokio::test]
async fn concurrent_auth_failures_share_one_renewal() {
	let transport = Arc::new(rotating_backend(StatusCode::OK).hold_stale_until(3));
	let (store, cleared) = stale_store();
	let client = SessionClient::with_transport(config(), store.clone(), transport.clone());
	let (first, second, third) = tokio::join!(
		client.send(RequestDescriptor::get("courses")),
		client.send(RequestDescriptor::get("courses/7")),
		client.send(RequestDescriptor::get("profile")),
	);

	for result in [first, second, third] {
		let response = result.expect("Every caller should succeed after the shared renewal.");

		assert_eq!(response.status, StatusCode::OK);
	}

	assert_eq!(transport.renewal_calls(), 1);
	assert_eq!(transport.api_calls(), 6);
	assert_eq!(client.coordinator.metrics().attempts(), 1);
	assert_eq!(client.coordinator.metrics().successes(), 1);
	assert_eq!(cleared.load(Ordering::SeqCst), 0);

	let seen = transport.seen();
	let renewal = seen
		.iter()
		.find(|seen| seen.path == RENEWAL_PATH)
		.expect("Renewal request should have been recorded.");

	assert_eq!(renewal.method, Method::POST);
	assert_eq!(renewal.body.as_deref(), Some(&b"{\"refresh_token\":\"refresh-1\"}"[..]));

	let retries: Vec<_> = seen
		.iter()
		.filter(|seen| seen.path != RENEWAL_PATH && seen.authorization.as_deref() == Some(FRESH))
		.collect();

	assert_eq!(retries.len(), 3);

	let credential = store.credential().expect("Renewed credential should be stored.");

	assert_eq!(credential.access_token.expose(), "fresh-access");
	assert_eq!(credential.refresh_token.as_ref().map(CredentialSecret::expose), Some("refresh-1"));
}

#[tokio::test]
async fn failed_renewal_expires_every_waiter_and_clears_once() {
	let transport = Arc::new(rotating_backend(StatusCode::UNAUTHORIZED).hold_stale_until(3));
	let (store, cleared) = stale_store();
	let client = SessionClient::with_transport(config(), store.clone(), transport.clone());
	let (first, second, third) = tokio::join!(
		client.send(RequestDescriptor::get("courses")),
		client.send(RequestDescriptor::get("courses")),
		client.send(RequestDescriptor::get("courses")),
	);

	for result in [first, second, third] {
		let err = result.expect_err("Every caller should observe the renewal failure.");

		assert!(err.is_authentication_expired());
		assert!(matches!(
			err,
			Error::AuthenticationExpired {
				cause: ExpiryCause::RenewalFailed(RenewalError::Rejected { status: 401 })
			}
		));
	}

	assert_eq!(transport.renewal_calls(), 1);
	assert_eq!(transport.api_calls(), 3);
	assert_eq!(cleared.load(Ordering::SeqCst), 1);
	assert!(store.credential().is_none());
	assert!(!client.coordinator.is_in_flight());
}

#[tokio::test]
async fn second_auth_failure_is_terminal_without_another_renewal() {
	let transport = Arc::new(FakeTransport::new(|seen| {
		if seen.path == RENEWAL_PATH {
			Ok(Reply::new(StatusCode::OK, "{\"access_token\":\"fresh-access\"}"))
		} else {
			Ok(Reply::new(StatusCode::FORBIDDEN, "{\"error\":\"forbidden\"}"))
		}
	}));
	let (store, cleared) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport.clone());
	let err = client
		.send(RequestDescriptor::get("admin"))
		.await
		.expect_err("A request rejected after renewal must fail.");

	assert!(matches!(
		err,
		Error::AuthenticationExpired { cause: ExpiryCause::RejectedAfterRenewal { status: 403 } }
	));
	assert_eq!(err.status(), Some(403));
	assert_eq!(transport.renewal_calls(), 1);
	assert_eq!(transport.api_calls(), 2);
	assert_eq!(cleared.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_renewal_endpoint_expires_the_session() {
	let transport = Arc::new(FakeTransport::new(|seen| {
		if seen.path == RENEWAL_PATH {
			Err(TransportError::Io(std::io::Error::new(
				std::io::ErrorKind::ConnectionRefused,
				"refresh host is down",
			)))
		} else {
			Ok(Reply::new(StatusCode::UNAUTHORIZED, ""))
		}
	}));
	let (store, cleared) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport);
	let err = client
		.send(RequestDescriptor::get("courses"))
		.await
		.expect_err("Unreachable renewal endpoint must expire the session.");

	assert!(matches!(
		err,
		Error::AuthenticationExpired {
			cause: ExpiryCause::RenewalFailed(RenewalError::Unreachable { .. })
		}
	));
	assert_eq!(cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_reported_and_surfaced() {
	let transport = Arc::new(FakeTransport::new(|_| {
		let mut reply = Reply::new(StatusCode::SERVICE_UNAVAILABLE, "maintenance");

		reply.headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		Ok(reply)
	}));
	let reporter = Arc::new(RecordingReporter::default());
	let (store, _) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport.clone())
		.with_reporter(reporter.clone());
	let err = client
		.send(RequestDescriptor::delete("courses/7"))
		.await
		.expect_err("Server errors must surface as failures.");

	match err {
		Error::Http { status, retry_after, body } => {
			assert_eq!(status, 503);
			assert_eq!(retry_after, Some(Duration::seconds(7)));
			assert_eq!(&body[..], b"maintenance");
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	let reports = reporter.reports();

	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].status, 503);
	assert_eq!(reports[0].method, Method::DELETE);
	assert_eq!(reports[0].url.as_str(), "https://api.example.com/v1/courses/7");
	assert_eq!(reports[0].body, "maintenance");
	assert_eq!(transport.renewal_calls(), 0);
}

#[tokio::test]
async fn failing_reporter_does_not_change_the_outcome() {
	let transport =
		Arc::new(FakeTransport::new(|_| Ok(Reply::new(StatusCode::INTERNAL_SERVER_ERROR, "oops"))));
	let reporter = Arc::new(RecordingReporter::failing());
	let (store, _) = stale_store();
	let client =
		SessionClient::with_transport(config(), store, transport).with_reporter(reporter.clone());
	let err = client
		.send(RequestDescriptor::get("courses"))
		.await
		.expect_err("Server errors must surface as failures.");

	assert_eq!(err.status(), Some(500));
	assert!(matches!(err, Error::Http { .. }));
	assert_eq!(reporter.reports().len(), 1);
}

#[tokio::test]
async fn client_errors_pass_through_untouched() {
	let transport =
		Arc::new(FakeTransport::new(|_| Ok(Reply::new(StatusCode::NOT_FOUND, "{\"error\":\"nope\"}"))));
	let reporter = Arc::new(RecordingReporter::default());
	let (store, cleared) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport.clone())
		.with_reporter(reporter.clone());
	let response = client
		.send(RequestDescriptor::get("missing"))
		.await
		.expect("Non-auth client errors should be returned as responses.");

	assert_eq!(response.status, StatusCode::NOT_FOUND);
	assert_eq!(response.text(), "{\"error\":\"nope\"}");
	assert!(reporter.reports().is_empty());
	assert_eq!(transport.renewal_calls(), 0);
	assert_eq!(cleared.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn network_failures_map_to_network_errors() {
	let transport = Arc::new(FakeTransport::new(|_| {
		Err(TransportError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")))
	}));
	let (store, _) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport.clone());
	let err = client
		.send(RequestDescriptor::get("courses"))
		.await
		.expect_err("Transport failures must surface.");

	assert!(matches!(err, Error::Network(TransportError::Io(_))));
	assert_eq!(transport.renewal_calls(), 0);
}

#[tokio::test]
async fn unresolvable_targets_fail_before_dispatch() {
	let transport = Arc::new(rotating_backend(StatusCode::OK));
	let (store, _) = stale_store();
	let client = SessionClient::with_transport(config(), store, transport.clone());
	let err = client
		.send(RequestDescriptor::get("http://[::1"))
		.await
		.expect_err("Malformed targets must be rejected.");

	assert!(matches!(err, Error::Config(_)));
	assert!(transport.seen().is_empty());
}
