// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capture hooks: process-wide failure signals turned into events.
//!
//! Every adapter (the panic hook, monitored tasks, host entry points) feeds a
//! [`Signal`] into one dispatcher. [`Signal::translate`] is the single place
//! where message templates and severities are decided.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use errorbot_core::{EventType, RuntimeInfo};

use crate::outcome::DeliveryOutcome;

/// Panic hooks are process-wide; tests touching them run one at a time.
#[cfg(test)]
pub(crate) static HOOK_TEST_LOCK: Mutex<()> = Mutex::new(());

/// What the host should do once a signal has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
	/// Let the host's default behaviour run.
	Continue,
	/// The failure ends the host unless something catches it. The panic hook
	/// reports, then lets unwinding continue.
	Terminate,
}

/// One triggering condition observed by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
	/// An uncaught panic.
	Panic {
		detail: String,
		location: Option<String>,
		thread: Option<String>,
		stack_trace: Option<String>,
	},
	/// A monitored task that returned `Err` or panicked.
	Rejection { task_id: String, reason: String },
	/// A host global error event (script engine, FFI boundary).
	GlobalError {
		message: String,
		source: String,
		line: u32,
		column: u32,
	},
	/// A host global async-rejection event.
	GlobalRejection { reason: String },
	/// An error handed over by a framework's error-handler slot.
	FrameworkError { error: String, info: String },
	/// A warning or notice raised by a host error handler.
	HostNotice {
		message: String,
		file: String,
		line: u32,
		event_type: EventType,
	},
	/// An explicit call from application code.
	Manual { message: String, event_type: EventType },
}

/// The event parts derived from a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
	pub message: String,
	pub event_type: EventType,
	pub context: RuntimeInfo,
	pub stack_trace: Option<String>,
	pub action: HookAction,
}

impl Signal {
	pub fn translate(self) -> Translated {
		let mut context = RuntimeInfo::new();
		let mut stack_trace = None;
		let mut event_type = EventType::Error;
		let mut action = HookAction::Continue;

		let message = match self {
			Signal::Panic {
				detail,
				location,
				thread,
				stack_trace: trace,
			} => {
				if let Some(location) = location {
					context.insert("location", location);
				}
				if let Some(thread) = thread {
					context.insert("thread", thread);
				}
				stack_trace = trace;
				action = HookAction::Terminate;
				format!("Unhandled exception: {detail}")
			}
			Signal::Rejection { task_id, reason } => {
				context.insert("task_id", task_id.clone());
				format!("Unhandled rejection at {task_id}: {reason}")
			}
			Signal::GlobalError {
				message,
				source,
				line,
				column,
			} => format!("Unhandled error: {message} at {source}:{line}:{column}"),
			Signal::GlobalRejection { reason } => format!("Unhandled rejection: {reason}"),
			Signal::FrameworkError { error, info } => format!("Framework error: {error}\nInfo: {info}"),
			Signal::HostNotice {
				message,
				file,
				line,
				event_type: notice_type,
			} => {
				event_type = notice_type;
				format!("{message} in {file} on line {line}")
			}
			Signal::Manual {
				message,
				event_type: manual_type,
			} => {
				event_type = manual_type;
				message
			}
		};

		Translated {
			message,
			event_type,
			context,
			stack_trace,
			action,
		}
	}
}

/// Panic payload as text; `"Box<dyn Any>"` for payloads that are not strings.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}

thread_local! {
	static IN_HOOK: Cell<bool> = const { Cell::new(false) };
	static MONITORED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as polling a monitored task. Panics raised while
/// the guard lives are reported as rejections, not through the panic hook.
pub(crate) struct MonitoredScope(());

impl MonitoredScope {
	pub(crate) fn enter() -> Self {
		MONITORED_DEPTH.with(|depth| depth.set(depth.get() + 1));
		Self(())
	}
}

impl Drop for MonitoredScope {
	fn drop(&mut self) {
		MONITORED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
	}
}

fn in_monitored_task() -> bool {
	MONITORED_DEPTH.with(|depth| depth.get() > 0)
}

struct ReentrancyGuard(());

impl ReentrancyGuard {
	fn enter() -> Option<Self> {
		IN_HOOK.with(|flag| {
			if flag.replace(true) {
				None
			} else {
				Some(Self(()))
			}
		})
	}
}

impl Drop for ReentrancyGuard {
	fn drop(&mut self) {
		IN_HOOK.with(|flag| flag.set(false));
	}
}

/// A report dispatched from the panic hook.
pub(crate) struct PanicReport {
	pub(crate) done: mpsc::Receiver<DeliveryOutcome>,
	pub(crate) grace: Duration,
}

impl PanicReport {
	/// Holds the panicking thread until the report settles or `grace` runs
	/// out. The hook cannot tell a caught panic from an uncaught one, so it
	/// never ends the process itself.
	fn finish(self) {
		if self.done.recv_timeout(self.grace).is_err() {
			eprintln!("errorbot: panic report still in flight after {:?}", self.grace);
		}
	}
}

/// Turns a panic signal into a dispatched report. Returns `None` when nothing
/// was sent.
pub(crate) type PanicDispatch = Arc<dyn Fn(Signal) -> Option<PanicReport> + Send + Sync>;

type BoxedHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;
type PreviousHook = Arc<BoxedHook>;

struct Registration {
	active: Arc<AtomicBool>,
	previous: PreviousHook,
	/// Address of our hook closure, to recognise it on top of the chain.
	hook: usize,
}

fn hook_addr(hook: &BoxedHook) -> usize {
	&**hook as *const _ as *const () as usize
}

/// Per-client installation state.
#[derive(Default)]
pub(crate) struct HookState {
	installed: AtomicBool,
	registration: Mutex<Option<Registration>>,
}

impl HookState {
	pub(crate) fn is_installed(&self) -> bool {
		self.installed.load(Ordering::SeqCst)
	}

	/// Chains a panic hook in front of the current one. Returns `false` when
	/// this state already installed one.
	pub(crate) fn install(&self, dispatch: PanicDispatch) -> bool {
		if std::thread::panicking() {
			return false;
		}
		if self.installed.swap(true, Ordering::SeqCst) {
			return false;
		}

		let previous: PreviousHook = Arc::new(panic::take_hook());
		let active = Arc::new(AtomicBool::new(true));

		let hook_previous = Arc::clone(&previous);
		let hook_active = Arc::clone(&active);
		let hook: BoxedHook = Box::new(move |info| {
			if !hook_active.load(Ordering::SeqCst) || in_monitored_task() {
				hook_previous(info);
				return;
			}
			let Some(_guard) = ReentrancyGuard::enter() else {
				hook_previous(info);
				return;
			};

			let signal = Signal::Panic {
				detail: panic_message(info.payload()),
				location: info
					.location()
					.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
				thread: std::thread::current().name().map(str::to_string),
				stack_trace: crate::backtrace::capture(),
			};

			let report = dispatch(signal);
			hook_previous(info);
			if let Some(report) = report {
				report.finish();
			}
		});
		let addr = hook_addr(&hook);
		panic::set_hook(hook);

		*self.lock() = Some(Registration {
			active,
			previous,
			hook: addr,
		});
		true
	}

	/// Disables our hook. The one active before [`install`](Self::install) is
	/// restored only while ours is still on top; a hook installed later keeps
	/// its place and ours stays beneath it as a pass-through. Returns `false`
	/// if nothing was installed.
	pub(crate) fn uninstall(&self) -> bool {
		if std::thread::panicking() {
			return false;
		}
		let Some(registration) = self.lock().take() else {
			return false;
		};

		registration.active.store(false, Ordering::SeqCst);
		let current = panic::take_hook();
		if hook_addr(&current) == registration.hook {
			let previous = registration.previous;
			panic::set_hook(Box::new(move |info| previous(info)));
		} else {
			panic::set_hook(current);
		}
		self.installed.store(false, Ordering::SeqCst);
		true
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Option<Registration>> {
		self.registration
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
