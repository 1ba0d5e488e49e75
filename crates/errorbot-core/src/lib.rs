// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the ErrorBot error-reporting SDK.
//!
//! This crate holds the event model shared by the capture hooks and the
//! transport in `errorbot`:
//!
//! - [`Event`]: an immutable record of one reportable failure
//! - [`EventType`]: its severity, `error` unless stated otherwise
//! - [`RuntimeInfo`]: optional string context flattened into the payload
//! - [`ApiKey`]: the collector key, redacted in every log line

pub mod api_key;
pub mod error;
pub mod event;
pub mod event_type;
pub mod runtime;

pub use api_key::{ApiKey, REDACTED};
pub use error::{CoreError, Result};
pub use event::{Event, EventBuilder, EMPTY_MESSAGE_PLACEHOLDER, RESERVED_KEYS};
pub use event_type::EventType;
pub use runtime::{RuntimeInfo, SDK_NAME, SDK_VERSION};
