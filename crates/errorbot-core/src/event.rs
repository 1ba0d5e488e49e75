// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The event: one structured record describing a single reportable failure.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::Result;
use crate::event_type::EventType;
use crate::runtime::RuntimeInfo;

/// Message used when a caller or hook supplies an empty one.
pub const EMPTY_MESSAGE_PLACEHOLDER: &str = "<empty message>";

/// Keys owned by the event itself. Runtime entries with these names are
/// dropped when the event is flattened onto the wire.
pub const RESERVED_KEYS: &[&str] = &["message", "type", "project", "timestamp", "stack_trace"];

/// An immutable error-telemetry event.
///
/// Constructed through [`Event::build`] or [`Event::builder`]; nothing can
/// change it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	message: String,
	event_type: EventType,
	project: String,
	timestamp: DateTime<Utc>,
	runtime_info: RuntimeInfo,
	stack_trace: Option<String>,
}

impl Event {
	/// Builds an event stamped with the current time.
	///
	/// An empty message is replaced by [`EMPTY_MESSAGE_PLACEHOLDER`]; building
	/// never fails.
	pub fn build(
		message: impl Into<String>,
		event_type: EventType,
		project: impl Into<String>,
		context: Option<RuntimeInfo>,
	) -> Self {
		let mut builder = Self::builder(message, project).event_type(event_type);
		if let Some(context) = context {
			builder = builder.runtime_info(context);
		}
		builder.build()
	}

	pub fn builder(message: impl Into<String>, project: impl Into<String>) -> EventBuilder {
		EventBuilder::new(message, project)
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn event_type(&self) -> EventType {
		self.event_type
	}

	pub fn project(&self) -> &str {
		&self.project
	}

	pub fn timestamp(&self) -> DateTime<Utc> {
		self.timestamp
	}

	/// Timestamp in the wire format, e.g. `2025-01-31T10:15:00.123Z`.
	pub fn timestamp_string(&self) -> String {
		self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
	}

	pub fn runtime_info(&self) -> &RuntimeInfo {
		&self.runtime_info
	}

	pub fn stack_trace(&self) -> Option<&str> {
		self.stack_trace.as_deref()
	}

	/// Serializes the event as the flat JSON object sent to the collector.
	pub fn to_json(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}
}

impl Serialize for Event {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("message", &self.message)?;
		map.serialize_entry("type", &self.event_type)?;
		map.serialize_entry("project", &self.project)?;
		map.serialize_entry("timestamp", &self.timestamp_string())?;
		if let Some(stack_trace) = &self.stack_trace {
			map.serialize_entry("stack_trace", stack_trace)?;
		}
		for (key, value) in self.runtime_info.iter() {
			if RESERVED_KEYS.contains(&key) {
				continue;
			}
			map.serialize_entry(key, value)?;
		}
		map.end()
	}
}

/// Builder for events that need more than message, type and project.
#[derive(Debug, Clone)]
pub struct EventBuilder {
	message: String,
	event_type: EventType,
	project: String,
	timestamp: Option<DateTime<Utc>>,
	runtime_info: RuntimeInfo,
	stack_trace: Option<String>,
}

impl EventBuilder {
	pub fn new(message: impl Into<String>, project: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			event_type: EventType::default(),
			project: project.into(),
			timestamp: None,
			runtime_info: RuntimeInfo::new(),
			stack_trace: None,
		}
	}

	pub fn event_type(mut self, event_type: EventType) -> Self {
		self.event_type = event_type;
		self
	}

	/// Merges `info` into the runtime context collected so far.
	pub fn runtime_info(mut self, info: RuntimeInfo) -> Self {
		self.runtime_info.merge(&info);
		self
	}

	/// Adds a single runtime context entry.
	pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.runtime_info.insert(key, value);
		self
	}

	/// Attaches a stack trace. Empty traces are ignored.
	pub fn stack_trace(mut self, stack_trace: Option<String>) -> Self {
		self.stack_trace = stack_trace.filter(|s| !s.trim().is_empty());
		self
	}

	/// Overrides the capture time. Mostly useful in tests.
	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub fn build(self) -> Event {
		let message = if self.message.trim().is_empty() {
			EMPTY_MESSAGE_PLACEHOLDER.to_string()
		} else {
			self.message
		};

		Event {
			message,
			event_type: self.event_type,
			project: self.project,
			timestamp: self.timestamp.unwrap_or_else(Utc::now),
			runtime_info: self.runtime_info,
			stack_trace: self.stack_trace,
		}
	}
}
