// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Developer diagnostics for validation findings.
//!
//! Validation findings are feedback for instrumentation authors, not
//! operational telemetry, so they flow through an explicitly injected
//! [`DiagnosticsSink`] rather than the `tracing` pipeline the rest of the
//! SDK logs to. Every component that emits findings takes a sink at
//! construction and defaults to [`NoopDiagnostics`]; absence of a sink never
//! changes behavior, it only suppresses output.

use std::sync::Mutex;

/// Receiver for validation diagnostics.
///
/// `group`/`group_end` bracket related findings (e.g. one validation pass
/// over an event); sinks without a nesting concept can leave them at the
/// default no-op.
pub trait DiagnosticsSink: Send + Sync {
	fn log(&self, message: &str);
	fn error(&self, message: &str);
	fn group(&self, _label: &str) {}
	fn group_end(&self) {}
}

/// Sink that discards everything; the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
	fn log(&self, _message: &str) {}
	fn error(&self, _message: &str) {}
}

/// Sink that forwards findings to `tracing`.
///
/// Group nesting flattens to debug-level lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
	fn log(&self, message: &str) {
		tracing::debug!("{}", message);
	}

	fn error(&self, message: &str) {
		tracing::error!("{}", message);
	}

	fn group(&self, label: &str) {
		tracing::debug!("{}", label);
	}
}

/// One recorded diagnostics call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEntry {
	Log(String),
	Error(String),
	Group(String),
	GroupEnd,
}

/// Sink that records every call, for assertions in tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
	entries: Mutex<Vec<DiagnosticEntry>>,
}

impl MemoryDiagnostics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Everything recorded so far, in call order.
	pub fn entries(&self) -> Vec<DiagnosticEntry> {
		self.entries
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}

	/// Just the `error` messages, in call order.
	pub fn errors(&self) -> Vec<String> {
		self.entries()
			.into_iter()
			.filter_map(|entry| match entry {
				DiagnosticEntry::Error(message) => Some(message),
				_ => None,
			})
			.collect()
	}

	pub fn clear(&self) {
		self.entries
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clear();
	}

	fn record(&self, entry: DiagnosticEntry) {
		self.entries
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.push(entry);
	}
}

impl DiagnosticsSink for MemoryDiagnostics {
	fn log(&self, message: &str) {
		self.record(DiagnosticEntry::Log(message.to_string()));
	}

	fn error(&self, message: &str) {
		self.record(DiagnosticEntry::Error(message.to_string()));
	}

	fn group(&self, label: &str) {
		self.record(DiagnosticEntry::Group(label.to_string()));
	}

	fn group_end(&self) {
		self.record(DiagnosticEntry::GroupEnd);
	}
}
