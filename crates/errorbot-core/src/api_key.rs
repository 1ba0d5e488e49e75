// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collector API key wrapper that keeps the key out of logs.
//!
//! ```
//! use errorbot_core::ApiKey;
//!
//! let key = ApiKey::new("key123");
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(format!("{key:?}"), "ApiKey(\"[REDACTED]\")");
//! assert_eq!(key.expose(), "key123");
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

/// An API key for the collector.
///
/// `Debug` and `Display` are redacted, there is no `Deref`, and the memory is
/// zeroed on drop. Call [`expose`](Self::expose) at the one place the raw key
/// is needed: the auth header.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ApiKey {
	inner: String,
}

impl ApiKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self { inner: key.into() }
	}

	pub fn expose(&self) -> &str {
		&self.inner
	}

	/// True when the key is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl Clone for ApiKey {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl PartialEq for ApiKey {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl Eq for ApiKey {}

impl From<String> for ApiKey {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for ApiKey {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
