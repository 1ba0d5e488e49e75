// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! An uncaught panic is reported once and still ends the process; panics the
//! host catches are reported and the host keeps running.
//!
//! The panicking side runs in a child process: this test binary re-executes
//! itself filtered down to one of the `*_child` tests.

use std::process::{Command, Output};
use std::time::Duration;

use errorbot::ErrorBotClient;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHILD_ENDPOINT: &str = "ERRORBOT_TEST_PANIC_ENDPOINT";
const SURVIVED: &str = "HOST SURVIVED";

fn child_client() -> Option<ErrorBotClient> {
	let endpoint = std::env::var(CHILD_ENDPOINT).ok()?;
	let client = ErrorBotClient::builder()
		.api_key("key123")
		.project_name("Demo")
		.endpoint_url(endpoint)
		.shutdown_grace(Duration::from_secs(5))
		.build()
		.unwrap();
	client.install_hooks();
	Some(client)
}

#[test]
fn panic_child() {
	let Some(_client) = child_client() else {
		return;
	};

	panic!("x is not defined");
}

#[test]
fn caught_panic_child() {
	let Some(_client) = child_client() else {
		return;
	};

	let caught = std::panic::catch_unwind(|| panic!("handled by host"));
	assert!(caught.is_err());
	let joined = std::thread::spawn(|| panic!("worker")).join();
	assert!(joined.is_err());

	println!("{SURVIVED}");
}

async fn run_child(name: &'static str, endpoint: String) -> Output {
	let exe = std::env::current_exe().unwrap();
	tokio::task::spawn_blocking(move || {
		Command::new(exe)
			.args(["--exact", name, "--nocapture", "--test-threads=1"])
			.env(CHILD_ENDPOINT, endpoint)
			.output()
	})
	.await
	.unwrap()
	.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn uncaught_panic_is_reported_and_fails_the_process() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/v1/report"))
		.and(header("X-API-Key", "key123"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.mount(&server)
		.await;

	let output = run_child("panic_child", format!("{}/api/v1/report", server.uri())).await;
	assert!(!output.status.success());

	let requests = server.received_requests().await.unwrap();
	assert_eq!(requests.len(), 1);
	let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
	assert_eq!(body["message"], "Unhandled exception: x is not defined");
	assert_eq!(body["type"], "error");
	assert_eq!(body["project"], "Demo");
	assert!(body["location"].as_str().unwrap().contains("panic_exit.rs"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_collector_still_fails_within_grace() {
	let started = std::time::Instant::now();
	let output = run_child("panic_child", "http://127.0.0.1:1/api/v1/report".to_string()).await;

	assert!(!output.status.success());
	assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test(flavor = "multi_thread")]
async fn caught_panics_are_reported_and_host_survives() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/v1/report"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
		.mount(&server)
		.await;

	let output = run_child("caught_panic_child", format!("{}/api/v1/report", server.uri())).await;
	assert!(output.status.success());
	assert!(String::from_utf8_lossy(&output.stdout).contains(SURVIVED));

	let requests = server.received_requests().await.unwrap();
	let mut messages: Vec<String> = requests
		.iter()
		.map(|r| {
			let body: Value = serde_json::from_slice(&r.body).unwrap();
			body["message"].as_str().unwrap().to_string()
		})
		.collect();
	messages.sort();
	assert_eq!(
		messages,
		vec![
			"Unhandled exception: handled by host".to_string(),
			"Unhandled exception: worker".to_string(),
		]
	);
}
