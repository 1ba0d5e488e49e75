// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local destinations for delivery outcomes.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use errorbot_core::EventType;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::outcome::DeliveryOutcome;

/// What the sink learns about one finished delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
	pub message: String,
	pub event_type: EventType,
	pub endpoint: String,
	pub outcome: DeliveryOutcome,
}

/// Receives the outcome of every delivery attempt.
///
/// Implementations must not panic; they run on the delivery task or on the
/// panic-hook thread.
pub trait OutcomeSink: Send + Sync {
	fn record(&self, report: &DeliveryReport);
}

/// Logs outcomes through `tracing`. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
	fn record(&self, report: &DeliveryReport) {
		match &report.outcome {
			DeliveryOutcome::Delivered => {
				info!(
					endpoint = %report.endpoint,
					event_type = %report.event_type,
					"Error reported successfully"
				);
			}
			DeliveryOutcome::RejectedByServer(reason) => {
				error!(
					endpoint = %report.endpoint,
					reason = %reason,
					"Failed to report error: rejected by collector"
				);
			}
			DeliveryOutcome::NetworkFailure(detail) => {
				error!(
					endpoint = %report.endpoint,
					error = %detail,
					"Failed to report error to collector"
				);
			}
			DeliveryOutcome::MalformedResponse(detail) => {
				warn!(
					endpoint = %report.endpoint,
					error = %detail,
					"Collector returned a malformed response"
				);
			}
		}
	}
}

/// Keeps every report in memory. Handy for tests and for hosts that surface
/// telemetry health themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
	reports: Mutex<Vec<DeliveryReport>>,
	changed: Condvar,
	notify: Notify,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reports(&self) -> Vec<DeliveryReport> {
		self.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// Waits until at least `count` reports arrived or `timeout` passed.
	pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			let notified = self.notify.notified();
			if self.len() >= count {
				return true;
			}
			if tokio::time::timeout_at(deadline, notified).await.is_err() {
				return self.len() >= count;
			}
		}
	}

	/// Blocking form of [`wait_for`](Self::wait_for).
	pub fn wait_for_blocking(&self, count: usize, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut reports = self.lock();
		while reports.len() < count {
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			reports = match self.changed.wait_timeout(reports, deadline - now) {
				Ok((guard, _)) => guard,
				Err(poisoned) => poisoned.into_inner().0,
			};
		}
		true
	}

	fn lock(&self) -> MutexGuard<'_, Vec<DeliveryReport>> {
		self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl OutcomeSink for MemorySink {
	fn record(&self, report: &DeliveryReport) {
		self.lock().push(report.clone());
		self.changed.notify_all();
		self.notify.notify_waiters();
	}
}
