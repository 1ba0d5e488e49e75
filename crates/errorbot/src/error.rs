// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the ErrorBot SDK.
//!
//! Only configuration can fail from the caller's point of view. Delivery
//! problems are [`DeliveryOutcome`](crate::DeliveryOutcome) values that get
//! logged and dropped.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for client construction.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Missing or invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The API key is missing or blank.
	#[error("API key is required")]
	MissingApiKey,

	/// The project name is missing or blank.
	#[error("project name is required")]
	MissingProjectName,

	/// The endpoint URL is missing or blank.
	#[error("endpoint URL is required")]
	MissingEndpointUrl,

	/// The endpoint URL does not parse or is not http(s).
	#[error("invalid endpoint URL {url:?}: {reason}")]
	InvalidEndpointUrl {
		/// The rejected value.
		url: String,
		/// Why it was rejected.
		reason: String,
	},

	/// Unknown protocol generation name.
	#[error("invalid protocol generation {0:?}: expected \"a\" or \"b\"")]
	InvalidProtocol(String),

	/// Request timeout is zero or not a number.
	#[error("invalid request timeout: {0}")]
	InvalidTimeout(String),

	/// The `*_FILE` secret could not be read.
	#[error("failed to read secret file at {path}: {source}")]
	SecretFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The HTTP client could not be constructed.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_name_the_field() {
		assert_eq!(ConfigError::MissingApiKey.to_string(), "API key is required");
		assert_eq!(
			ConfigError::InvalidProtocol("c".to_string()).to_string(),
			"invalid protocol generation \"c\": expected \"a\" or \"b\""
		);
	}

	#[test]
	fn invalid_url_includes_reason() {
		let err = ConfigError::InvalidEndpointUrl {
			url: "ftp://x".to_string(),
			reason: "unsupported scheme".to_string(),
		};
		assert!(err.to_string().contains("unsupported scheme"));
	}
}
