// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ErrorBot client: configuration, capture hooks and delivery wired together.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

use errorbot_core::{ApiKey, Event, EventType, RuntimeInfo};
use futures::future::CatchUnwind;
use futures::FutureExt;
use pin_project_lite::pin_project;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{validate_timeout, ClientConfig, Protocol};
use crate::error::{ConfigError, Result};
use crate::hooks::{panic_message, HookAction, HookState, MonitoredScope, PanicDispatch, PanicReport, Signal, Translated};
use crate::outcome::DeliveryOutcome;
use crate::sink::{DeliveryReport, OutcomeSink, TracingSink};
use crate::transport::{HttpTransport, Transport};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> String {
	format!("task-{}", NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Builder for constructing an [`ErrorBotClient`].
pub struct ErrorBotClientBuilder {
	config: Option<ClientConfig>,
	api_key: Option<ApiKey>,
	project_name: Option<String>,
	endpoint_url: Option<String>,
	protocol: Option<Protocol>,
	request_timeout: Option<Duration>,
	shutdown_grace: Option<Duration>,
	runtime_info: RuntimeInfo,
	transport: Option<Arc<dyn Transport>>,
	sink: Option<Arc<dyn OutcomeSink>>,
}

impl ErrorBotClientBuilder {
	pub fn new() -> Self {
		Self {
			config: None,
			api_key: None,
			project_name: None,
			endpoint_url: None,
			protocol: None,
			request_timeout: None,
			shutdown_grace: None,
			runtime_info: RuntimeInfo::new(),
			transport: None,
			sink: None,
		}
	}

	/// Starts from an existing configuration, e.g. [`ClientConfig::from_env`].
	/// Values set on the builder still override it.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn api_key(mut self, key: impl Into<ApiKey>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	pub fn project_name(mut self, name: impl Into<String>) -> Self {
		self.project_name = Some(name.into());
		self
	}

	/// Sets the collector endpoint.
	///
	/// Example: `https://errorbot.fyi/api/v1/report`
	pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
		self.endpoint_url = Some(url.into());
		self
	}

	/// Overrides the protocol inferred from the endpoint path. Accepts a
	/// [`ProtocolGeneration`](crate::ProtocolGeneration) or a [`Protocol`].
	pub fn protocol(mut self, protocol: impl Into<Protocol>) -> Self {
		self.protocol = Some(protocol.into());
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);
		self
	}

	/// Upper bound the panic hook waits for its report before the panic
	/// continues unwinding.
	pub fn shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = Some(grace);
		self
	}

	/// Adds a static context entry sent with every event.
	///
	/// Example: `.context("environment", "production")`
	pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.runtime_info.insert(key, value);
		self
	}

	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Replaces the default [`TracingSink`].
	pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn build(self) -> Result<ErrorBotClient> {
		let mut config = match self.config {
			Some(config) if self.api_key.is_none() && self.project_name.is_none() && self.endpoint_url.is_none() => {
				config
			}
			base => {
				let api_key = self
					.api_key
					.or_else(|| base.as_ref().map(|c| c.api_key().clone()))
					.ok_or(ConfigError::MissingApiKey)?;
				let project_name = self
					.project_name
					.or_else(|| base.as_ref().map(|c| c.project_name().to_string()))
					.ok_or(ConfigError::MissingProjectName)?;
				let endpoint_changed = self.endpoint_url.is_some();
				let endpoint_url = self
					.endpoint_url
					.or_else(|| base.as_ref().map(|c| c.endpoint_url().to_string()))
					.ok_or(ConfigError::MissingEndpointUrl)?;

				let fresh = ClientConfig::new(api_key, project_name, endpoint_url)?;
				match base {
					Some(base) => {
						// A new endpoint re-infers the protocol; otherwise the base one stands.
						let fresh = if endpoint_changed {
							fresh
						} else {
							fresh.with_protocol(base.protocol())
						};
						fresh
							.with_request_timeout(base.request_timeout())
							.with_shutdown_grace(base.shutdown_grace())
							.with_runtime_info(base.runtime_info().clone())
					}
					None => fresh,
				}
			}
		};

		if let Some(protocol) = self.protocol {
			config = config.with_protocol(protocol);
		}
		if let Some(timeout) = self.request_timeout {
			config = config.with_request_timeout(validate_timeout(timeout)?);
		}
		if let Some(grace) = self.shutdown_grace {
			config = config.with_shutdown_grace(grace);
		}
		config = config.with_runtime_info(self.runtime_info);

		let transport = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new()?),
		};
		let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

		Ok(ErrorBotClient::from_parts(config, transport, sink))
	}
}

impl Default for ErrorBotClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Internal client state.
struct ClientInner {
	config: ClientConfig,
	transport: Arc<dyn Transport>,
	sink: Arc<dyn OutcomeSink>,
	context: RuntimeInfo,
	in_flight: AtomicUsize,
	idle: Notify,
	idle_lock: Mutex<()>,
	idle_blocking: Condvar,
	closed: AtomicBool,
	hooks: HookState,
}

impl ClientInner {
	fn event_for(&self, translated: Translated) -> Event {
		Event::builder(translated.message, self.config.project_name())
			.event_type(translated.event_type)
			.runtime_info(self.context.clone())
			.runtime_info(translated.context)
			.stack_trace(translated.stack_trace)
			.build()
	}

	async fn send(&self, event: Event) -> DeliveryOutcome {
		let message = event.message().to_string();
		let event_type = event.event_type();
		let outcome = self.transport.deliver(event, &self.config).await;
		self.record(message, event_type, &outcome);
		outcome
	}

	fn send_blocking(&self, event: Event) -> DeliveryOutcome {
		let message = event.message().to_string();
		let event_type = event.event_type();
		let outcome = self.transport.deliver_blocking(event, &self.config);
		self.record(message, event_type, &outcome);
		outcome
	}

	fn record(&self, message: String, event_type: EventType, outcome: &DeliveryOutcome) {
		self.sink.record(&DeliveryReport {
			message,
			event_type,
			endpoint: self.config.endpoint_url().to_string(),
			outcome: outcome.clone(),
		});
	}

	fn finish_one(&self) {
		if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
			self.idle.notify_waiters();
			let _guard = self.idle_lock.lock().unwrap_or_else(|p| p.into_inner());
			self.idle_blocking.notify_all();
		}
	}
}

/// Counts one delivery as in flight until dropped.
struct InFlight {
	inner: Arc<ClientInner>,
}

impl InFlight {
	fn enter(inner: &Arc<ClientInner>) -> Self {
		inner.in_flight.fetch_add(1, Ordering::SeqCst);
		Self {
			inner: Arc::clone(inner),
		}
	}
}

impl Drop for InFlight {
	fn drop(&mut self) {
		self.inner.finish_one();
	}
}

pin_project! {
	/// Polls a task inside a [`MonitoredScope`] so its panics surface as
	/// rejections.
	struct Monitored<F> {
		#[pin]
		inner: CatchUnwind<AssertUnwindSafe<F>>,
	}
}

impl<F: Future> Future for Monitored<F> {
	type Output = thread::Result<F::Output>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let _scope = MonitoredScope::enter();
		self.project().inner.poll(cx)
	}
}

/// Client for capturing failures and reporting them to an ErrorBot collector.
///
/// # Example
///
/// ```ignore
/// use errorbot::{ErrorBotClient, EventType};
///
/// let client = ErrorBotClient::initialize("key123", "Demo", "https://errorbot.fyi/api/v1/report")?;
///
/// // Report panics before they unwind
/// client.install_hooks();
///
/// // Manual report, returns immediately
/// client.report_error("disk full", EventType::Warning);
///
/// // Task failures become "Unhandled rejection" events
/// client.spawn_monitored(async { sync_inventory().await });
///
/// client.shutdown(Duration::from_secs(2)).await;
/// ```
#[derive(Clone)]
pub struct ErrorBotClient {
	inner: Arc<ClientInner>,
}

impl fmt::Debug for ErrorBotClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorBotClient")
			.field("config", &self.inner.config)
			.field("closed", &self.is_closed())
			.field("hooks_installed", &self.hooks_installed())
			.finish()
	}
}

impl ErrorBotClient {
	pub fn builder() -> ErrorBotClientBuilder {
		ErrorBotClientBuilder::new()
	}

	/// Creates a client from the three required values with default settings.
	pub fn initialize(
		api_key: impl Into<ApiKey>,
		project_name: impl Into<String>,
		endpoint_url: impl Into<String>,
	) -> Result<Self> {
		Self::builder()
			.api_key(api_key)
			.project_name(project_name)
			.endpoint_url(endpoint_url)
			.build()
	}

	/// Creates a client from `ERRORBOT_*` environment variables.
	pub fn from_env() -> Result<Self> {
		Self::builder().config(ClientConfig::from_env()?).build()
	}

	fn from_parts(config: ClientConfig, transport: Arc<dyn Transport>, sink: Arc<dyn OutcomeSink>) -> Self {
		let mut context = RuntimeInfo::detect();
		context.merge(config.runtime_info());

		info!(
			endpoint = %config.endpoint_url(),
			project = %config.project_name(),
			"ErrorBot client initialized"
		);

		Self {
			inner: Arc::new(ClientInner {
				config,
				transport,
				sink,
				context,
				in_flight: AtomicUsize::new(0),
				idle: Notify::new(),
				idle_lock: Mutex::new(()),
				idle_blocking: Condvar::new(),
				closed: AtomicBool::new(false),
				hooks: HookState::default(),
			}),
		}
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Installs the panic hook. Calling it again on the same client is a
	/// no-op; returns whether this call installed it.
	pub fn install_hooks(&self) -> bool {
		let installed = self.inner.hooks.install(panic_dispatch(&self.inner));
		if installed {
			info!("Panic hook installed");
		} else {
			debug!("Panic hook already installed");
		}
		installed
	}

	/// Removes the panic hook and restores the one that was active before.
	pub fn uninstall_hooks(&self) -> bool {
		let removed = self.inner.hooks.uninstall();
		if removed {
			info!("Panic hook removed");
		}
		removed
	}

	pub fn hooks_installed(&self) -> bool {
		self.inner.hooks.is_installed()
	}

	/// Reports an error without waiting for delivery.
	///
	/// Runs on the current tokio runtime when there is one, otherwise on a
	/// short-lived thread. The outcome only reaches the outcome sink.
	pub fn report_error(&self, message: impl Into<String>, event_type: EventType) {
		self.handle_signal(Signal::Manual {
			message: message.into(),
			event_type,
		});
	}

	/// Reports an error and waits for the single delivery attempt.
	pub async fn deliver(&self, message: impl Into<String>, event_type: EventType) -> DeliveryOutcome {
		let translated = Signal::Manual {
			message: message.into(),
			event_type,
		}
		.translate();

		if self.is_closed() {
			warn!(message = %translated.message, "ErrorBot client is shut down, dropping report");
			return DeliveryOutcome::NetworkFailure("request not sent: client is shut down".to_string());
		}

		let event = self.inner.event_for(translated);
		let guard = InFlight::enter(&self.inner);
		guard.inner.send(event).await
	}

	/// Reports a signal from any adapter and tells the adapter how to proceed.
	///
	/// Delivery is fire-and-forget. A [`Signal::Panic`] fed through here is
	/// reported and nothing more; the returned action is advisory.
	pub fn handle_signal(&self, signal: Signal) -> HookAction {
		let translated = signal.translate();
		let action = translated.action;

		if self.is_closed() {
			warn!(message = %translated.message, "ErrorBot client is shut down, dropping report");
			return action;
		}

		let event = self.inner.event_for(translated);
		let guard = InFlight::enter(&self.inner);

		match Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move {
					guard.inner.send(event).await;
				});
			}
			Err(_) => {
				let spawned = thread::Builder::new()
					.name("errorbot-report".to_string())
					.spawn(move || {
						guard.inner.send_blocking(event);
					});
				if let Err(e) = spawned {
					warn!(error = %e, "Failed to spawn report thread, dropping report");
				}
			}
		}

		action
	}

	/// Host global error event (`onerror`-style). The host keeps its default
	/// behaviour.
	pub fn report_global_error(
		&self,
		message: impl Into<String>,
		source: impl Into<String>,
		line: u32,
		column: u32,
	) -> HookAction {
		self.handle_signal(Signal::GlobalError {
			message: message.into(),
			source: source.into(),
			line,
			column,
		})
	}

	/// Host global async-rejection event.
	pub fn report_global_rejection(&self, reason: impl fmt::Display) -> HookAction {
		self.handle_signal(Signal::GlobalRejection {
			reason: reason.to_string(),
		})
	}

	/// Error handed to a framework's error-handler slot.
	pub fn report_framework_error(&self, error: impl fmt::Display, info: impl Into<String>) -> HookAction {
		self.handle_signal(Signal::FrameworkError {
			error: error.to_string(),
			info: info.into(),
		})
	}

	/// Warning or notice from a host error handler; `error` unless a type is
	/// given.
	pub fn report_host_notice(
		&self,
		message: impl Into<String>,
		file: impl Into<String>,
		line: u32,
		event_type: Option<EventType>,
	) -> HookAction {
		self.handle_signal(Signal::HostNotice {
			message: message.into(),
			file: file.into(),
			line,
			event_type: event_type.unwrap_or(EventType::Error),
		})
	}

	/// Spawns a task whose failure is reported as an unhandled rejection.
	///
	/// An `Err` or a panic becomes one `Unhandled rejection at task-<n>` event
	/// and the handle resolves to `None` once it was delivered; the process
	/// keeps running. Must be called from within a tokio runtime.
	pub fn spawn_monitored<F, T, E>(&self, future: F) -> JoinHandle<Option<T>>
	where
		F: Future<Output = std::result::Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: fmt::Display + Send + 'static,
	{
		let task_id = next_task_id();
		let client = self.clone();

		tokio::spawn(async move {
			let monitored = Monitored {
				inner: AssertUnwindSafe(future).catch_unwind(),
			};
			let reason = match monitored.await {
				Ok(Ok(value)) => return Some(value),
				Ok(Err(e)) => e.to_string(),
				Err(payload) => panic_message(&*payload),
			};

			debug!(task_id = %task_id, reason = %reason, "Monitored task failed");
			client.report_rejection(task_id, reason).await;
			None
		})
	}

	async fn report_rejection(&self, task_id: String, reason: String) {
		let translated = Signal::Rejection { task_id, reason }.translate();
		if self.is_closed() {
			warn!(message = %translated.message, "ErrorBot client is shut down, dropping report");
			return;
		}
		let event = self.inner.event_for(translated);
		let guard = InFlight::enter(&self.inner);
		guard.inner.send(event).await;
	}

	/// Number of deliveries currently running.
	pub fn in_flight(&self) -> usize {
		self.inner.in_flight.load(Ordering::SeqCst)
	}

	/// Waits until no delivery is running. Returns `false` on timeout.
	pub async fn flush(&self, timeout: Duration) -> bool {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			let idle = self.inner.idle.notified();
			if self.in_flight() == 0 {
				return true;
			}
			if tokio::time::timeout_at(deadline, idle).await.is_err() {
				return self.in_flight() == 0;
			}
		}
	}

	/// Blocking form of [`flush`](Self::flush) for hosts without a runtime.
	pub fn flush_blocking(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut guard = self.inner.idle_lock.lock().unwrap_or_else(|p| p.into_inner());
		while self.in_flight() > 0 {
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			guard = match self.inner.idle_blocking.wait_timeout(guard, deadline - now) {
				Ok((guard, _)) => guard,
				Err(poisoned) => poisoned.into_inner().0,
			};
		}
		true
	}

	/// Stops accepting reports, removes the panic hook and waits for running
	/// deliveries. Safe to call more than once.
	pub async fn shutdown(&self, timeout: Duration) -> bool {
		if !self.inner.closed.swap(true, Ordering::SeqCst) {
			self.uninstall_hooks();
			info!("ErrorBot client shutdown");
		}
		self.flush(timeout).await
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}

/// The panic hook's view of the client. Holds a weak reference so an
/// installed hook does not keep a dropped client alive.
fn panic_dispatch(inner: &Arc<ClientInner>) -> PanicDispatch {
	let weak = Arc::downgrade(inner);
	Arc::new(move |signal: Signal| {
		let inner = weak.upgrade()?;
		if inner.closed.load(Ordering::SeqCst) {
			return None;
		}

		let translated = signal.translate();
		let event = inner.event_for(translated);
		let (tx, done) = mpsc::channel();
		let guard = InFlight::enter(&inner);

		// A blocking client must not run on a runtime worker, so the report
		// always goes out on its own thread.
		let spawned = thread::Builder::new()
			.name("errorbot-panic-report".to_string())
			.spawn(move || {
				let outcome = guard.inner.send_blocking(event);
				let _ = tx.send(outcome);
			});
		if let Err(e) = spawned {
			eprintln!("errorbot: failed to report panic: {e}");
		}

		Some(PanicReport {
			done,
			grace: inner.config.shutdown_grace(),
		})
	})
}
