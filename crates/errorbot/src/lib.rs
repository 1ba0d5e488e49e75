// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ErrorBot error-reporting SDK for Rust applications.
//!
//! Captures failures that would otherwise go unreported (uncaught panics,
//! failed background tasks, host error events) plus manual reports, and sends
//! each one as a single JSON POST to an ErrorBot collector. Delivery never
//! blocks the caller and never propagates an error back to the failure site;
//! outcomes are logged locally and dropped.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use errorbot::{ErrorBotClient, EventType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let errorbot = ErrorBotClient::builder()
//!         .api_key("key123")
//!         .project_name("Demo")
//!         .endpoint_url("https://errorbot.fyi/api/v1/report")
//!         .context("environment", "production")
//!         .build()?;
//!
//!     // Panics are reported before they unwind; caught ones leave the host running
//!     errorbot.install_hooks();
//!
//!     // Failed tasks become "Unhandled rejection at task-<n>: ..." events
//!     errorbot.spawn_monitored(async { refresh_cache().await });
//!
//!     // Manual report; returns immediately
//!     errorbot.report_error("disk full", EventType::Warning);
//!
//!     errorbot.shutdown(Duration::from_secs(2)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Collector protocols
//!
//! Two collector generations are supported. They differ in path, auth header
//! and response body; see [`ProtocolGeneration`]. The generation is inferred
//! from the endpoint path unless set explicitly.
//!
//! # Configuration from the environment
//!
//! [`ClientConfig::from_env`] reads `ERRORBOT_API_KEY` (or
//! `ERRORBOT_API_KEY_FILE`), `ERRORBOT_PROJECT`, `ERRORBOT_ENDPOINT`,
//! `ERRORBOT_PROTOCOL` and `ERRORBOT_TIMEOUT_MS`.

mod backtrace;
mod client;
mod config;
mod error;
mod hooks;
mod http;
mod outcome;
mod sink;
mod transport;

pub use client::{ErrorBotClient, ErrorBotClientBuilder};
pub use config::{
	vars, AuthScheme, ClientConfig, Protocol, ProtocolGeneration, ResponseMode, DEFAULT_ENDPOINT,
	DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
};
pub use error::{ConfigError, Result};
pub use hooks::{panic_message, HookAction, Signal, Translated};
pub use http::user_agent;
pub use outcome::{classify, DeliveryOutcome};
pub use sink::{DeliveryReport, MemorySink, OutcomeSink, TracingSink};
pub use transport::{HttpTransport, Transport};

// Re-export core types for convenience
pub use errorbot_core::{
	ApiKey, CoreError, Event, EventBuilder, EventType, RuntimeInfo, EMPTY_MESSAGE_PLACEHOLDER,
	SDK_NAME, SDK_VERSION,
};
