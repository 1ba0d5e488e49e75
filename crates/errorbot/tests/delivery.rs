// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end delivery against a synthetic collector.

use std::sync::Arc;
use std::time::{Duration, Instant};

use errorbot::{DeliveryOutcome, ErrorBotClient, EventType, MemorySink, ProtocolGeneration};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(endpoint: String, sink: Arc<MemorySink>) -> ErrorBotClient {
	ErrorBotClient::builder()
		.api_key("key123")
		.project_name("Demo")
		.endpoint_url(endpoint)
		.request_timeout(Duration::from_millis(500))
		.sink(sink)
		.build()
		.unwrap()
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
	server
		.received_requests()
		.await
		.unwrap()
		.iter()
		.map(|r| serde_json::from_slice(&r.body).unwrap())
		.collect()
}

#[tokio::test]
async fn manual_report_reaches_generation_b_collector() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/v1/report"))
		.and(header("X-API-Key", "key123"))
		.and(header("Content-Type", "application/json"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.expect(1)
		.mount(&server)
		.await;

	let sink = Arc::new(MemorySink::new());
	let client = client_for(ProtocolGeneration::B.endpoint(&server.uri()), Arc::clone(&sink));

	client.report_error("disk full", EventType::Warning);
	assert!(sink.wait_for(1, Duration::from_secs(5)).await);
	assert_eq!(sink.reports()[0].outcome, DeliveryOutcome::Delivered);

	let bodies = request_bodies(&server).await;
	assert_eq!(bodies.len(), 1);
	let body = &bodies[0];
	assert_eq!(body["message"], "disk full");
	assert_eq!(body["type"], "warning");
	assert_eq!(body["project"], "Demo");
	assert_eq!(body["runtime"], "rust");
	assert_eq!(body["sdk_name"], "errorbot-rust");

	let timestamp = body["timestamp"].as_str().unwrap();
	assert!(timestamp.ends_with('Z'), "{timestamp}");
	assert!(is_rfc3339_millis(timestamp), "{timestamp}");
}

fn is_rfc3339_millis(timestamp: &str) -> bool {
	// 2025-01-31T10:15:00.123Z
	timestamp.len() == 24 && timestamp.as_bytes()[10] == b'T' && timestamp.as_bytes()[19] == b'.'
}

#[tokio::test]
async fn generation_a_uses_bearer_auth() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/errors"))
		.and(header("Authorization", "Bearer key123"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(
		ProtocolGeneration::A.endpoint(&server.uri()),
		Arc::new(MemorySink::new()),
	);

	let outcome = client.deliver("Unhandled error: boom", EventType::Error).await;
	assert_eq!(outcome, DeliveryOutcome::Delivered);

	let requests = server.received_requests().await.unwrap();
	assert!(requests[0].headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn explicit_protocol_overrides_path() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/ingest"))
		.and(header("Authorization", "Bearer key123"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let client = ErrorBotClient::builder()
		.api_key("key123")
		.project_name("Demo")
		.endpoint_url(format!("{}/ingest", server.uri()))
		.protocol(ProtocolGeneration::A)
		.sink(Arc::new(MemorySink::new()))
		.build()
		.unwrap();

	assert_eq!(client.deliver("boom", EventType::Error).await, DeliveryOutcome::Delivered);
}

#[tokio::test]
async fn server_error_is_reported_once_and_host_continues() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;

	let sink = Arc::new(MemorySink::new());
	let client = client_for(ProtocolGeneration::B.endpoint(&server.uri()), Arc::clone(&sink));

	client.report_error("disk full", EventType::Error);
	assert!(sink.wait_for(1, Duration::from_secs(5)).await);
	assert!(client.flush(Duration::from_secs(5)).await);

	let report = &sink.reports()[0];
	assert!(!report.outcome.is_delivered());
	assert_eq!(report.outcome, DeliveryOutcome::NetworkFailure("HTTP 500".to_string()));
}

#[tokio::test]
async fn rejected_report_is_logged_not_raised() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"success": false,
			"error": {"message": "invalid api key"}
		})))
		.mount(&server)
		.await;

	let sink = Arc::new(MemorySink::new());
	let client = client_for(ProtocolGeneration::B.endpoint(&server.uri()), Arc::clone(&sink));

	let outcome = client.deliver("disk full", EventType::Error).await;
	assert_eq!(outcome, DeliveryOutcome::RejectedByServer("invalid api key".to_string()));
	assert_eq!(sink.reports()[0].outcome, outcome);
}

#[tokio::test]
async fn hung_collector_is_bounded_by_timeout() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({"success": true}))
				.set_delay(Duration::from_secs(10)),
		)
		.mount(&server)
		.await;

	let client = client_for(
		ProtocolGeneration::B.endpoint(&server.uri()),
		Arc::new(MemorySink::new()),
	);

	let started = Instant::now();
	let outcome = client.deliver("slow", EventType::Error).await;
	assert!(matches!(outcome, DeliveryOutcome::NetworkFailure(_)), "{outcome}");
	assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn monitored_task_failure_is_one_rejection() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(
		ProtocolGeneration::B.endpoint(&server.uri()),
		Arc::new(MemorySink::new()),
	);

	let handle = client.spawn_monitored(async { Err::<(), _>("connection reset") });
	assert_eq!(handle.await.unwrap(), None);

	let bodies = request_bodies(&server).await;
	assert_eq!(bodies.len(), 1);
	let message = bodies[0]["message"].as_str().unwrap();
	assert!(message.starts_with("Unhandled rejection at task-"), "{message}");
	assert!(message.ends_with(": connection reset"), "{message}");
	assert_eq!(bodies[0]["type"], "error");
}

#[tokio::test]
async fn no_request_after_shutdown() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.expect(0)
		.mount(&server)
		.await;

	let client = client_for(
		ProtocolGeneration::B.endpoint(&server.uri()),
		Arc::new(MemorySink::new()),
	);
	client.shutdown(Duration::from_secs(1)).await;

	client.report_error("too late", EventType::Error);
	assert!(client.flush(Duration::from_secs(1)).await);
}

#[test]
fn unreachable_collector_without_runtime_does_not_disturb_host() {
	let sink = Arc::new(MemorySink::new());
	let client = client_for("http://127.0.0.1:1/api/v1/report".to_string(), Arc::clone(&sink));

	client.report_error("disk full", EventType::Error);
	assert!(sink.wait_for_blocking(1, Duration::from_secs(5)));
	assert!(matches!(sink.reports()[0].outcome, DeliveryOutcome::NetworkFailure(_)));
}
