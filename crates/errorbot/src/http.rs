// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client construction with a consistent User-Agent header.

use errorbot_core::{SDK_NAME, SDK_VERSION};

/// Returns the SDK User-Agent string.
///
/// Format: `errorbot-rust/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{}/{} ({}-{})",
		SDK_NAME,
		SDK_VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

/// Async client builder with the SDK User-Agent.
pub fn builder() -> reqwest::ClientBuilder {
	reqwest::Client::builder().user_agent(user_agent())
}

/// Blocking client builder with the SDK User-Agent.
///
/// Must not be built or dropped inside an async runtime; the panic path runs
/// it on a dedicated thread.
pub fn blocking_builder() -> reqwest::blocking::ClientBuilder {
	reqwest::blocking::Client::builder().user_agent(user_agent())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("errorbot-rust/"));
		assert!(ua.contains(std::env::consts::OS));
		assert!(ua.ends_with(')'));
	}

	#[test]
	fn builder_builds() {
		assert!(builder().build().is_ok());
	}
}
