// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: report errors with the ErrorBot SDK.
//!
//! Run with:
//!   ERRORBOT_API_KEY=key123 ERRORBOT_PROJECT=Demo cargo run --example report -p errorbot
//!
//! Set `ERRORBOT_EXAMPLE_PANIC=1` to end with an uncaught panic.

use std::time::Duration;

use errorbot::{ClientConfig, ErrorBotClient, EventType};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = ClientConfig::from_env()?;
	println!("Initializing ErrorBot client...");
	println!("  Endpoint: {}", config.endpoint_url());
	println!("  Project: {}", config.project_name());
	println!("  API key: {}", config.api_key());

	let client = ErrorBotClient::builder()
		.config(config)
		.context("environment", "development")
		.context("server_name", "example-server")
		.build()?;

	client.install_hooks();

	println!("Sending manual report...");
	let outcome = client.deliver("Example warning from errorbot", EventType::Warning).await;
	println!("  Outcome: {outcome}");

	println!("Running a task that fails...");
	let handle = client.spawn_monitored(async {
		tokio::time::sleep(Duration::from_millis(10)).await;
		Err::<(), _>("inventory sync timed out")
	});
	handle.await?;

	client.report_global_error("x is not defined", "app.js", 10, 3);
	client.report_error("fire-and-forget report", EventType::Info);

	if std::env::var("ERRORBOT_EXAMPLE_PANIC").is_ok() {
		let items: Vec<u32> = Vec::new();
		println!("Panicking; the hook reports before the process fails");
		println!("{}", items[3]);
	}

	let flushed = client.shutdown(Duration::from_secs(2)).await;
	println!("Done (flushed: {flushed})");
	Ok(())
}
