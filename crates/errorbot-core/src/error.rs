// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the event model.

use thiserror::Error;

/// Errors that can occur while working with event model types.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid event type: {0}")]
	InvalidEventType(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for event model operations.
pub type Result<T> = std::result::Result<T, CoreError>;
