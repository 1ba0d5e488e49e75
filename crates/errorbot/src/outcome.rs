// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Classification of a single delivery attempt.

use std::fmt;

use serde_json::Value;

use crate::config::ResponseMode;

/// Result of one attempt to send an event to the collector.
///
/// These are values, not errors: every outcome is logged locally and then
/// dropped. Nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
	/// The collector accepted the event.
	Delivered,
	/// The collector understood the request and declined it.
	RejectedByServer(String),
	/// No usable response: DNS, connect, TLS, timeout, reset, or a non-2xx
	/// status without a parseable body.
	NetworkFailure(String),
	/// A 2xx response whose body does not follow the envelope contract.
	MalformedResponse(String),
}

impl DeliveryOutcome {
	pub fn is_delivered(&self) -> bool {
		matches!(self, Self::Delivered)
	}

	/// Short stable name used as a log field.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Delivered => "delivered",
			Self::RejectedByServer(_) => "rejected_by_server",
			Self::NetworkFailure(_) => "network_failure",
			Self::MalformedResponse(_) => "malformed_response",
		}
	}

	pub fn detail(&self) -> Option<&str> {
		match self {
			Self::Delivered => None,
			Self::RejectedByServer(d) | Self::NetworkFailure(d) | Self::MalformedResponse(d) => Some(d.as_str()),
		}
	}
}

impl fmt::Display for DeliveryOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.detail() {
			Some(detail) => write!(f, "{}: {}", self.kind(), detail),
			None => f.write_str(self.kind()),
		}
	}
}

/// Interprets a collector response.
///
/// Non-2xx statuses become [`DeliveryOutcome::RejectedByServer`] when the body
/// is JSON and [`DeliveryOutcome::NetworkFailure`] otherwise. For 2xx the
/// response mode decides whether the `success` envelope is required.
pub fn classify(status: u16, body: &[u8], mode: ResponseMode) -> DeliveryOutcome {
	let parsed = parse_body(body);

	if !(200..300).contains(&status) {
		return match parsed {
			Some(value) => match error_message(&value) {
				Some(message) => DeliveryOutcome::RejectedByServer(format!("HTTP {status}: {message}")),
				None => DeliveryOutcome::RejectedByServer(format!("HTTP {status}")),
			},
			None => DeliveryOutcome::NetworkFailure(format!("HTTP {status}")),
		};
	}

	match mode {
		ResponseMode::SuccessEnvelope => {
			let Some(value) = parsed else {
				return DeliveryOutcome::MalformedResponse(if body_is_blank(body) {
					"empty response body".to_string()
				} else {
					"response body is not JSON".to_string()
				});
			};
			match value.get("success").and_then(Value::as_bool) {
				Some(true) => DeliveryOutcome::Delivered,
				Some(false) => DeliveryOutcome::RejectedByServer(
					error_message(&value).unwrap_or_else(|| "unknown error".to_string()),
				),
				None => DeliveryOutcome::MalformedResponse("missing boolean `success` field".to_string()),
			}
		}
		ResponseMode::StatusOnly => {
			let declined = parsed
				.as_ref()
				.and_then(|value| value.get("success"))
				.and_then(Value::as_bool)
				== Some(false);
			if declined {
				let message = parsed
					.as_ref()
					.and_then(error_message)
					.unwrap_or_else(|| "unknown error".to_string());
				DeliveryOutcome::RejectedByServer(message)
			} else {
				DeliveryOutcome::Delivered
			}
		}
	}
}

fn body_is_blank(body: &[u8]) -> bool {
	body.iter().all(u8::is_ascii_whitespace)
}

fn parse_body(body: &[u8]) -> Option<Value> {
	if body_is_blank(body) {
		return None;
	}
	serde_json::from_slice(body).ok()
}

/// `error.message`, or `error` when the collector sends a bare string.
fn error_message(value: &Value) -> Option<String> {
	value
		.pointer("/error/message")
		.and_then(Value::as_str)
		.or_else(|| value.get("error").and_then(Value::as_str))
		.map(str::to_string)
}
