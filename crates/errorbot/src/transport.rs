// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The only component that performs network I/O.
//!
//! One event becomes exactly one POST. The response is classified into a
//! [`DeliveryOutcome`]; there is no retry and no queue.

use errorbot_core::Event;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ConfigError, Result};
use crate::outcome::{classify, DeliveryOutcome};

/// Sends events to the collector.
///
/// Implementations hold no per-call mutable state and may be invoked
/// concurrently.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	/// Delivers one event, bounded by the configured request timeout.
	async fn deliver(&self, event: Event, config: &ClientConfig) -> DeliveryOutcome;

	/// Blocking form used on the panic path.
	///
	/// Must be called from a plain thread, never from inside an async runtime.
	fn deliver_blocking(&self, event: Event, config: &ClientConfig) -> DeliveryOutcome;
}

/// A request ready to be sent by either client flavour.
struct PreparedRequest {
	body: Vec<u8>,
	auth_name: &'static str,
	auth_value: String,
}

impl PreparedRequest {
	fn new(event: &Event, config: &ClientConfig) -> std::result::Result<Self, DeliveryOutcome> {
		let body = event
			.to_json()
			.map_err(|e| DeliveryOutcome::NetworkFailure(format!("request not sent: {e}")))?;
		let auth = config.protocol().auth;
		Ok(Self {
			body,
			auth_name: auth.header_name(),
			auth_value: auth.header_value(config.api_key()),
		})
	}
}

/// `reqwest`-backed transport. The async connection pool is shared by all
/// deliveries made through this value.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	pub fn new() -> Result<Self> {
		let client = crate::http::builder().build().map_err(ConfigError::HttpClient)?;
		Ok(Self { client })
	}

	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn deliver(&self, event: Event, config: &ClientConfig) -> DeliveryOutcome {
		let request = match PreparedRequest::new(&event, config) {
			Ok(request) => request,
			Err(outcome) => return outcome,
		};
		let url = config.endpoint_url().clone();

		debug!(endpoint = %url, project = %event.project(), "Sending error report");

		let response = match self
			.client
			.post(url)
			.timeout(config.request_timeout())
			.header(CONTENT_TYPE, "application/json")
			.header(request.auth_name, request.auth_value)
			.body(request.body)
			.send()
			.await
		{
			Ok(response) => response,
			Err(e) => return DeliveryOutcome::NetworkFailure(describe_error(&e)),
		};

		let status = response.status().as_u16();
		let body = match response.bytes().await {
			Ok(body) => body,
			Err(e) => return DeliveryOutcome::NetworkFailure(describe_error(&e)),
		};

		finish(status, &body, config)
	}

	fn deliver_blocking(&self, event: Event, config: &ClientConfig) -> DeliveryOutcome {
		let request = match PreparedRequest::new(&event, config) {
			Ok(request) => request,
			Err(outcome) => return outcome,
		};

		let client = match crate::http::blocking_builder()
			.timeout(config.request_timeout())
			.build()
		{
			Ok(client) => client,
			Err(e) => return DeliveryOutcome::NetworkFailure(describe_error(&e)),
		};

		debug!(endpoint = %config.endpoint_url(), "Sending error report (blocking)");

		let response = match client
			.post(config.endpoint_url().clone())
			.header(CONTENT_TYPE, "application/json")
			.header(request.auth_name, request.auth_value)
			.body(request.body)
			.send()
		{
			Ok(response) => response,
			Err(e) => return DeliveryOutcome::NetworkFailure(describe_error(&e)),
		};

		let status = response.status().as_u16();
		let body = match response.bytes() {
			Ok(body) => body,
			Err(e) => return DeliveryOutcome::NetworkFailure(describe_error(&e)),
		};

		finish(status, &body, config)
	}
}

fn finish(status: u16, body: &[u8], config: &ClientConfig) -> DeliveryOutcome {
	if !(200..300).contains(&status) {
		warn!(status, endpoint = %config.endpoint_url(), "Collector returned non-success status");
	}
	classify(status, body, config.protocol().response)
}

fn describe_error(e: &reqwest::Error) -> String {
	if e.is_timeout() {
		format!("request timed out: {e}")
	} else if e.is_connect() {
		format!("connection failed: {e}")
	} else {
		e.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ProtocolGeneration;
	use errorbot_core::EventType;
	use serde_json::json;
	use std::time::{Duration, Instant};
	use wiremock::matchers::{body_partial_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config_for(server: &MockServer, generation: ProtocolGeneration) -> ClientConfig {
		ClientConfig::new("key123", "Demo", generation.endpoint(&server.uri()))
			.unwrap()
			.with_request_timeout(Duration::from_millis(500))
	}

	fn event() -> Event {
		Event::build("disk full", EventType::Warning, "Demo", None)
	}

	#[tokio::test]
	async fn generation_b_sends_api_key_header_and_flat_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/report"))
			.and(header("X-API-Key", "key123"))
			.and(header("Content-Type", "application/json"))
			.and(body_partial_json(json!({
				"message": "disk full",
				"type": "warning",
				"project": "Demo",
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::new().unwrap();
		let outcome = transport
			.deliver(event(), &config_for(&server, ProtocolGeneration::B))
			.await;

		assert_eq!(outcome, DeliveryOutcome::Delivered);

		let requests = server.received_requests().await.unwrap();
		assert_eq!(requests.len(), 1);
		assert!(requests[0].headers.get("authorization").is_none());
	}

	#[tokio::test]
	async fn generation_a_sends_bearer_and_accepts_empty_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/errors"))
			.and(header("Authorization", "Bearer key123"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::new().unwrap();
		let outcome = transport
			.deliver(event(), &config_for(&server, ProtocolGeneration::A))
			.await;

		assert_eq!(outcome, DeliveryOutcome::Delivered);
		let requests = server.received_requests().await.unwrap();
		assert!(requests[0].headers.get("x-api-key").is_none());
	}

	#[tokio::test]
	async fn rejection_envelope_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"success": false,
				"error": {"message": "invalid api key"}
			})))
			.mount(&server)
			.await;

		let outcome = HttpTransport::new()
			.unwrap()
			.deliver(event(), &config_for(&server, ProtocolGeneration::B))
			.await;

		assert_eq!(outcome, DeliveryOutcome::RejectedByServer("invalid api key".to_string()));
	}

	#[tokio::test]
	async fn server_error_is_attempted_once_and_not_delivered() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500))
			.expect(1)
			.mount(&server)
			.await;

		let outcome = HttpTransport::new()
			.unwrap()
			.deliver(event(), &config_for(&server, ProtocolGeneration::B))
			.await;

		assert_eq!(outcome, DeliveryOutcome::NetworkFailure("HTTP 500".to_string()));
	}

	#[tokio::test]
	async fn malformed_body_is_classified() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_string("ok"))
			.mount(&server)
			.await;

		let outcome = HttpTransport::new()
			.unwrap()
			.deliver(event(), &config_for(&server, ProtocolGeneration::B))
			.await;

		assert!(matches!(outcome, DeliveryOutcome::MalformedResponse(_)));
	}

	#[tokio::test]
	async fn slow_collector_times_out_within_bound() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({"success": true}))
					.set_delay(Duration::from_secs(10)),
			)
			.mount(&server)
			.await;

		let config = config_for(&server, ProtocolGeneration::B)
			.with_request_timeout(Duration::from_millis(200));

		let started = Instant::now();
		let outcome = HttpTransport::new().unwrap().deliver(event(), &config).await;

		assert!(matches!(outcome, DeliveryOutcome::NetworkFailure(_)));
		assert!(started.elapsed() < Duration::from_secs(2));
	}

	#[tokio::test]
	async fn unreachable_collector_is_network_failure() {
		let config = ClientConfig::new("key123", "Demo", "http://127.0.0.1:1/api/v1/report")
			.unwrap()
			.with_request_timeout(Duration::from_millis(500));

		let outcome = HttpTransport::new().unwrap().deliver(event(), &config).await;
		assert!(matches!(outcome, DeliveryOutcome::NetworkFailure(_)));
	}

	#[tokio::test]
	async fn blocking_delivery_uses_same_contract() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/report"))
			.and(header("X-API-Key", "key123"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
			.expect(1)
			.mount(&server)
			.await;

		let config = config_for(&server, ProtocolGeneration::B);
		let worker = std::thread::spawn(move || {
			HttpTransport::new().unwrap().deliver_blocking(event(), &config)
		});
		let outcome = tokio::task::spawn_blocking(move || worker.join().unwrap())
			.await
			.unwrap();

		assert_eq!(outcome, DeliveryOutcome::Delivered);
	}
}
