// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and rendering for panic reports.

use rustc_demangle::demangle;
use std::backtrace::{Backtrace, BacktraceStatus};

/// One parsed backtrace frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	pub function: String,
	pub location: Option<String>,
	pub in_app: bool,
}

/// Renders a captured backtrace as the event's `stack_trace` text.
///
/// Returns `None` when capture is disabled (`RUST_BACKTRACE` unset) or no
/// frame survives parsing. Leading runtime and SDK frames are dropped so the
/// trace starts at the code that panicked.
pub fn render_backtrace(backtrace: &Backtrace) -> Option<String> {
	if backtrace.status() != BacktraceStatus::Captured {
		return None;
	}
	render_frames(&parse_backtrace_string(&format!("{backtrace}")))
}

/// Captures the current backtrace honouring `RUST_BACKTRACE`.
pub fn capture() -> Option<String> {
	render_backtrace(&Backtrace::capture())
}

fn render_frames(frames: &[Frame]) -> Option<String> {
	let start = frames.iter().position(|f| f.in_app).unwrap_or(0);
	let rendered: Vec<String> = frames[start..]
		.iter()
		.map(|frame| match &frame.location {
			Some(location) => format!("  at {} ({})", frame.function, location),
			None => format!("  at {}", frame.function),
		})
		.collect();

	if rendered.is_empty() {
		None
	} else {
		Some(rendered.join("\n"))
	}
}

/// Parses `Display` output of [`Backtrace`]: `N: symbol` lines, each
/// optionally followed by an `at file:line:col` line.
fn parse_backtrace_string(bt_string: &str) -> Vec<Frame> {
	let mut frames: Vec<Frame> = Vec::new();

	for line in bt_string.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				if frame.location.is_none() {
					frame.location = Some(location.trim().to_string());
				}
			}
			continue;
		}

		if let Some(frame) = parse_frame_line(line) {
			frames.push(frame);
		}
	}

	frames
}

fn parse_frame_line(line: &str) -> Option<Frame> {
	let function_part = match line.split_once(':') {
		Some((prefix, rest)) if prefix.trim().parse::<u32>().is_ok() => rest.trim(),
		_ => line,
	};

	if function_part.is_empty() {
		return None;
	}

	let function = demangle(function_part).to_string();
	let in_app = is_in_app_frame(&function);

	Some(Frame {
		function,
		location: None,
		in_app,
	})
}

/// Whether a frame belongs to the host application rather than the
/// standard library, async runtime or this SDK.
fn is_in_app_frame(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"futures_util::",
		"<futures_util::",
		"async_trait::",
		"tracing::",
		"<tracing::",
		"errorbot::",
		"<errorbot::",
		"errorbot_core::",
		"<errorbot_core::",
		"panic_unwind::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
	];

	const SYSTEM_CONTAINS: &[&str] = &["::panicking::", "::sys_common::", "::rt::"];

	if SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p)) {
		return false;
	}
	!SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}
