// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default plugin stamping the application identity onto every event.

use std::sync::Arc;

use loom_tracker_core::{context_types, GlobalContext, TrackerEvent};

use crate::diagnostics::{DiagnosticsSink, NoopDiagnostics};
use crate::plugin::TrackerPlugin;
use crate::rules::{ContextScope, RequiresContextRule, UniqueContextRule, ValidationRule};

const PLUGIN_NAME: &str = "ApplicationContextPlugin";

/// Adds an `ApplicationContext` global context to every event and validates
/// that exactly one is present.
///
/// Installed by default by the tracker builder; the context value is built
/// once from the application id and cloned per event.
pub struct ApplicationContextPlugin {
	context: GlobalContext,
	diagnostics: Arc<dyn DiagnosticsSink>,
	rules: Vec<Box<dyn ValidationRule>>,
}

impl ApplicationContextPlugin {
	pub fn new(application_id: impl Into<String>) -> Self {
		Self {
			context: GlobalContext::application(application_id),
			diagnostics: Arc::new(NoopDiagnostics),
			rules: vec![
				Box::new(RequiresContextRule::new(
					PLUGIN_NAME,
					context_types::APPLICATION,
					ContextScope::GlobalContexts,
				)),
				Box::new(UniqueContextRule::new(
					PLUGIN_NAME,
					context_types::APPLICATION,
					ContextScope::GlobalContexts,
				)),
			],
		}
	}

	pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
		self.diagnostics = diagnostics;
		self
	}
}

impl TrackerPlugin for ApplicationContextPlugin {
	fn plugin_name(&self) -> &'static str {
		PLUGIN_NAME
	}

	fn enrich(&self, event: &mut TrackerEvent) {
		event.global_contexts.push(self.context.clone());
	}

	fn validate(&self, event: &TrackerEvent) {
		for rule in &self.rules {
			rule.check(event, self.diagnostics.as_ref());
		}
	}
}
