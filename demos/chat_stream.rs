//! Demonstrates a chat stream whose first attempt hits an expired credential: the client
//! renews through the refresh endpoint, reopens the stream, and prints tokens as they arrive.

// std
use std::{io::Write, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use session_transport::{
	client::SessionClient,
	config::ClientConfig,
	http::ReqwestTransport,
	obs::TracingReporter,
	reqwest::Client,
	request::RequestDescriptor,
	session::{MemorySessionStore, SessionCredential},
	stream::StreamEvent,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/chat").header("authorization", "Bearer expired-access");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"renewed-access\"}");
		})
		.await;
	let chat = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/chat").header("authorization", "Bearer renewed-access");
			then.status(200).header("content-type", "text/event-stream").body(concat!(
				"data: {\"token\":\"Hello\"}\n\n",
				"data: {\"token\":\", \"}\n\n",
				"data: {\"token\":\"world\"}\n\n",
				"data: {\"done\":true,\"finish_reason\":\"stop\"}\n\n",
			));
		})
		.await;
	let config = ClientConfig::builder(Url::parse(&server.url("/api/"))?)
		.renewal_endpoint("auth/refresh")
		.build()?;
	let store = Arc::new(
		MemorySessionStore::with_credential(SessionCredential::new(
			"expired-access",
			Some("demo-refresh".into()),
		))
		.with_clear_hook(|| println!("Session cleared; send the user back to login.")),
	);
	// The mock server presents a self-signed certificate.
	let transport = ReqwestTransport::try_from_builder(
		Client::builder().danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true),
	)?;
	let client = SessionClient::with_transport(config, store, Arc::new(transport))
		.with_reporter(Arc::new(TracingReporter));
	let request =
		RequestDescriptor::post("chat").with_json(&json!({ "prompt": "Say hello." }))?;
	let end = client
		.stream(request, |event: StreamEvent| {
			if let Some(token) = event.as_token() {
				print!("{token}");

				let _ = std::io::stdout().flush();
			}
		})
		.await?;

	println!();
	println!("Stream finished: {end:?}.");

	expired.assert_async().await;
	refresh.assert_async().await;
	chat.assert_async().await;

	Ok(())
}
