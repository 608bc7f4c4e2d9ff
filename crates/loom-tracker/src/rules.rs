// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Composable validation rules for plugins.
//!
//! Each rule is a pure check over an event that reports findings through a
//! [`DiagnosticsSink`] and never fails: validation must not interrupt the
//! tracking pipeline. Rules carry the owning plugin's name so findings are
//! attributable, and support a `once` latch that suppresses repeat findings
//! from the same rule instance after the first firing.

use std::sync::atomic::{AtomicBool, Ordering};

use loom_tracker_core::TrackerEvent;

use crate::diagnostics::DiagnosticsSink;

/// Which context collection a rule searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextScope {
	GlobalContexts,
	LocationStack,
}

impl ContextScope {
	fn describe(&self) -> &'static str {
		match self {
			ContextScope::GlobalContexts => "global contexts",
			ContextScope::LocationStack => "the location stack",
		}
	}
}

/// A check over an event that emits findings as diagnostics.
pub trait ValidationRule: Send + Sync {
	fn rule_name(&self) -> &'static str;
	fn check(&self, event: &TrackerEvent, sink: &dyn DiagnosticsSink);
}

fn count_matching(event: &TrackerEvent, scope: ContextScope, context_type: &str) -> usize {
	match scope {
		ContextScope::GlobalContexts => event
			.global_contexts
			.iter()
			.filter(|context| context.context_type == context_type)
			.count(),
		ContextScope::LocationStack => event
			.location_stack
			.iter()
			.filter(|context| context.context_type == context_type)
			.count(),
	}
}

fn emit(
	plugin_name: &str,
	rule_name: &str,
	once: bool,
	fired: &AtomicBool,
	sink: &dyn DiagnosticsSink,
	finding: &str,
) {
	if once && fired.swap(true, Ordering::SeqCst) {
		return;
	}
	sink.error(&format!("{plugin_name}:{rule_name}: {finding}"));
}

/// Finding when zero contexts of the given type are present in the scope.
pub struct RequiresContextRule {
	plugin_name: &'static str,
	context_type: String,
	scope: ContextScope,
	once: bool,
	fired: AtomicBool,
}

impl RequiresContextRule {
	pub fn new(
		plugin_name: &'static str,
		context_type: impl Into<String>,
		scope: ContextScope,
	) -> Self {
		Self {
			plugin_name,
			context_type: context_type.into(),
			scope,
			once: false,
			fired: AtomicBool::new(false),
		}
	}

	/// Report this finding at most once for the lifetime of the rule.
	pub fn once(mut self) -> Self {
		self.once = true;
		self
	}
}

impl ValidationRule for RequiresContextRule {
	fn rule_name(&self) -> &'static str {
		"RequiresContextRule"
	}

	fn check(&self, event: &TrackerEvent, sink: &dyn DiagnosticsSink) {
		if count_matching(event, self.scope, &self.context_type) == 0 {
			emit(
				self.plugin_name,
				self.rule_name(),
				self.once,
				&self.fired,
				sink,
				&format!(
					"{} is missing from {}",
					self.context_type,
					self.scope.describe()
				),
			);
		}
	}
}

/// Finding when more than one context of the given type is present in the
/// scope.
pub struct UniqueContextRule {
	plugin_name: &'static str,
	context_type: String,
	scope: ContextScope,
	once: bool,
	fired: AtomicBool,
}

impl UniqueContextRule {
	pub fn new(
		plugin_name: &'static str,
		context_type: impl Into<String>,
		scope: ContextScope,
	) -> Self {
		Self {
			plugin_name,
			context_type: context_type.into(),
			scope,
			once: false,
			fired: AtomicBool::new(false),
		}
	}

	/// Report this finding at most once for the lifetime of the rule.
	pub fn once(mut self) -> Self {
		self.once = true;
		self
	}
}

impl ValidationRule for UniqueContextRule {
	fn rule_name(&self) -> &'static str {
		"UniqueContextRule"
	}

	fn check(&self, event: &TrackerEvent, sink: &dyn DiagnosticsSink) {
		if count_matching(event, self.scope, &self.context_type) > 1 {
			emit(
				self.plugin_name,
				self.rule_name(),
				self.once,
				&self.fired,
				sink,
				&format!(
					"only one {} should be present in {}",
					self.context_type,
					self.scope.describe()
				),
			);
		}
	}
}

/// Finding when the first matching location context is not at the expected
/// stack index. Absence is not a finding; pair with [`RequiresContextRule`]
/// when presence is also required.
pub struct PositionRule {
	plugin_name: &'static str,
	context_type: String,
	index: usize,
	once: bool,
	fired: AtomicBool,
}

impl PositionRule {
	pub fn new(plugin_name: &'static str, context_type: impl Into<String>, index: usize) -> Self {
		Self {
			plugin_name,
			context_type: context_type.into(),
			index,
			once: false,
			fired: AtomicBool::new(false),
		}
	}

	/// Report this finding at most once for the lifetime of the rule.
	pub fn once(mut self) -> Self {
		self.once = true;
		self
	}
}

impl ValidationRule for PositionRule {
	fn rule_name(&self) -> &'static str {
		"PositionRule"
	}

	fn check(&self, event: &TrackerEvent, sink: &dyn DiagnosticsSink) {
		let actual = event
			.location_stack
			.iter()
			.position(|context| context.context_type == self.context_type);
		if let Some(actual) = actual {
			if actual != self.index {
				emit(
					self.plugin_name,
					self.rule_name(),
					self.once,
					&self.fired,
					sink,
					&format!(
						"{} is not at position {} of the location stack",
						self.context_type, self.index
					),
				);
			}
		}
	}
}
