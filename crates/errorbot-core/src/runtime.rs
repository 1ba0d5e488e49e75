// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free-form runtime context attached to events.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// SDK name reported in `sdk_name`.
pub const SDK_NAME: &str = "errorbot-rust";
/// SDK version reported in `sdk_version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// String-to-string context such as runtime version, host, or server name.
///
/// Entries are kept ordered so serialized payloads are deterministic. Empty
/// values are never stored; absent context is simply omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeInfo(BTreeMap<String, String>);

impl RuntimeInfo {
	pub fn new() -> Self {
		Self::default()
	}

	/// Context gathered from the running process.
	pub fn detect() -> Self {
		let mut info = Self::new();
		info.insert("sdk_name", SDK_NAME);
		info.insert("sdk_version", SDK_VERSION);
		info.insert("runtime", "rust");
		info.insert("os", std::env::consts::OS);
		info.insert("arch", std::env::consts::ARCH);
		info
	}

	/// Inserts an entry, ignoring empty values.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();
		if key.is_empty() || value.is_empty() {
			return;
		}
		self.0.insert(key, value);
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);
		self
	}

	/// Copies every entry of `other` into `self`; `other` wins on conflicts.
	pub fn merge(&mut self, other: &RuntimeInfo) {
		for (key, value) in other.iter() {
			self.0.insert(key.to_string(), value.to_string());
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuntimeInfo {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut info = Self::new();
		for (key, value) in iter {
			info.insert(key, value);
		}
		info
	}
}

impl IntoIterator for RuntimeInfo {
	type Item = (String, String);
	type IntoIter = btree_map::IntoIter<String, String>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
