// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered, uniquely-named plugin collection.
//!
//! The registry owns the plugins and drives the three pipeline passes over
//! an event: `enrich` (mutating, unconditional), `validate` (read-only,
//! diagnostics only) and `before_transport` (mutating, usability-gated).
//!
//! Mutation methods are configuration-time operations: they take `&mut self`
//! and the tracker exposes them only through exclusive access, so they can
//! never race an in-flight pass.

use std::sync::Arc;

use loom_tracker_core::TrackerEvent;
use tracing::debug;

use crate::diagnostics::{DiagnosticsSink, NoopDiagnostics};
use crate::error::{Result, TrackerError};
use crate::plugin::TrackerPlugin;

pub struct PluginRegistry {
	plugins: Vec<Box<dyn TrackerPlugin>>,
	diagnostics: Arc<dyn DiagnosticsSink>,
}

impl Default for PluginRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl PluginRegistry {
	pub fn new() -> Self {
		Self::with_diagnostics(Arc::new(NoopDiagnostics))
	}

	pub fn with_diagnostics(diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
		Self {
			plugins: Vec::new(),
			diagnostics,
		}
	}

	fn position(&self, name: &str) -> Option<usize> {
		self.plugins
			.iter()
			.position(|plugin| plugin.plugin_name() == name)
	}

	/// Append a plugin at the end of the registry.
	pub fn add(&mut self, plugin: Box<dyn TrackerPlugin>) -> Result<()> {
		let index = self.plugins.len();
		self.add_at(plugin, index)
	}

	/// Insert a plugin at an explicit position, shifting later plugins.
	pub fn add_at(&mut self, plugin: Box<dyn TrackerPlugin>, index: usize) -> Result<()> {
		if index > self.plugins.len() {
			return Err(TrackerError::InvalidPluginIndex { index });
		}
		let name = plugin.plugin_name();
		if self.has(name) {
			return Err(TrackerError::PluginAlreadyExists {
				name: name.to_string(),
			});
		}
		self.plugins.insert(index, plugin);
		debug!(plugin = name, index, "registered tracker plugin");
		Ok(())
	}

	/// Remove a plugin by name; the relative order of the others is kept.
	pub fn remove(&mut self, name: &str) -> Result<()> {
		let position = self.position(name).ok_or_else(|| TrackerError::PluginNotFound {
			name: name.to_string(),
		})?;
		self.plugins.remove(position);
		debug!(plugin = name, "removed tracker plugin");
		Ok(())
	}

	/// Swap in a plugin for the registered one with the same name, keeping
	/// the old plugin's position.
	pub fn replace(&mut self, plugin: Box<dyn TrackerPlugin>) -> Result<()> {
		let position = self.position(plugin.plugin_name()).ok_or_else(|| {
			TrackerError::PluginNotFound {
				name: plugin.plugin_name().to_string(),
			}
		})?;
		self.plugins[position] = plugin;
		Ok(())
	}

	/// Swap in a plugin for the registered one with the same name and move
	/// it to an explicit position, shifting the others accordingly.
	pub fn replace_at(&mut self, plugin: Box<dyn TrackerPlugin>, index: usize) -> Result<()> {
		if index > self.plugins.len() {
			return Err(TrackerError::InvalidPluginIndex { index });
		}
		let position = self.position(plugin.plugin_name()).ok_or_else(|| {
			TrackerError::PluginNotFound {
				name: plugin.plugin_name().to_string(),
			}
		})?;
		self.plugins.remove(position);
		let index = index.min(self.plugins.len());
		self.plugins.insert(index, plugin);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Result<&dyn TrackerPlugin> {
		self.position(name)
			.map(|position| self.plugins[position].as_ref())
			.ok_or_else(|| TrackerError::PluginNotFound {
				name: name.to_string(),
			})
	}

	pub fn has(&self, name: &str) -> bool {
		self.position(name).is_some()
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.plugins.iter().map(|plugin| plugin.plugin_name()).collect()
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}

	/// Run every plugin's `enrich` in registry order, regardless of
	/// usability; later plugins observe contexts added by earlier ones.
	pub fn enrich(&self, event: &mut TrackerEvent) {
		for plugin in &self.plugins {
			plugin.enrich(event);
		}
	}

	/// Run every plugin's `validate` in registry order. Findings go to the
	/// diagnostics sink, bracketed as one group per pass; the event is never
	/// altered.
	pub fn validate(&self, event: &TrackerEvent) {
		self.diagnostics
			.group(&format!("validate {}", event.event_type()));
		for plugin in &self.plugins {
			plugin.validate(event);
		}
		self.diagnostics.group_end();
	}

	/// Run `before_transport` on currently-usable plugins, in registry
	/// order; non-usable plugins are skipped silently.
	pub fn before_transport(&self, event: &mut TrackerEvent) {
		for plugin in &self.plugins {
			if plugin.is_usable() {
				plugin.before_transport(event);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_tracker_core::LocationContext;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	struct NamedPlugin {
		name: &'static str,
	}

	impl NamedPlugin {
		fn boxed(name: &'static str) -> Box<dyn TrackerPlugin> {
			Box::new(Self { name })
		}
	}

	impl TrackerPlugin for NamedPlugin {
		fn plugin_name(&self) -> &'static str {
			self.name
		}
	}

	struct StackPlugin {
		name: &'static str,
		context_id: &'static str,
	}

	impl TrackerPlugin for StackPlugin {
		fn plugin_name(&self) -> &'static str {
			self.name
		}

		fn enrich(&self, event: &mut TrackerEvent) {
			event
				.location_stack
				.push(LocationContext::content(self.context_id));
		}
	}

	struct GatedPlugin {
		name: &'static str,
		usable: AtomicBool,
		before_transport_calls: AtomicUsize,
	}

	impl TrackerPlugin for GatedPlugin {
		fn plugin_name(&self) -> &'static str {
			self.name
		}

		fn is_usable(&self) -> bool {
			self.usable.load(Ordering::SeqCst)
		}

		fn before_transport(&self, _event: &mut TrackerEvent) {
			self.before_transport_calls.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[test]
	fn test_add_rejects_duplicate_names() {
		let mut registry = PluginRegistry::new();
		registry.add(NamedPlugin::boxed("A")).unwrap();
		let error = registry.add(NamedPlugin::boxed("A")).unwrap_err();
		assert!(matches!(
			error,
			TrackerError::PluginAlreadyExists { name } if name == "A"
		));
	}

	#[test]
	fn test_add_at_inserts_at_the_given_position() {
		let mut registry = PluginRegistry::new();
		registry.add(NamedPlugin::boxed("A")).unwrap();
		registry.add(NamedPlugin::boxed("C")).unwrap();
		registry.add_at(NamedPlugin::boxed("B"), 1).unwrap();
		assert_eq!(registry.names(), vec!["A", "B", "C"]);
	}

	#[test]
	fn test_add_at_rejects_out_of_range_index() {
		let mut registry = PluginRegistry::new();
		let error = registry.add_at(NamedPlugin::boxed("A"), 3).unwrap_err();
		assert!(matches!(
			error,
			TrackerError::InvalidPluginIndex { index: 3 }
		));
	}

	#[test]
	fn test_remove_preserves_relative_order() {
		let mut registry = PluginRegistry::new();
		for name in ["A", "B", "C"] {
			registry.add(NamedPlugin::boxed(name)).unwrap();
		}
		registry.remove("B").unwrap();
		assert_eq!(registry.names(), vec!["A", "C"]);
	}

	#[test]
	fn test_remove_unknown_plugin_fails() {
		let mut registry = PluginRegistry::new();
		let error = registry.remove("Ghost").unwrap_err();
		assert!(matches!(
			error,
			TrackerError::PluginNotFound { name } if name == "Ghost"
		));
	}

	#[test]
	fn test_replace_keeps_the_old_position() {
		let mut registry = PluginRegistry::new();
		for name in ["A", "B", "C"] {
			registry.add(NamedPlugin::boxed(name)).unwrap();
		}
		registry.replace(NamedPlugin::boxed("B")).unwrap();
		assert_eq!(registry.names(), vec!["A", "B", "C"]);
	}

	#[test]
	fn test_replace_at_moves_to_the_explicit_position() {
		let mut registry = PluginRegistry::new();
		for name in ["A", "B", "C"] {
			registry.add(NamedPlugin::boxed(name)).unwrap();
		}
		registry.replace_at(NamedPlugin::boxed("A"), 2).unwrap();
		assert_eq!(registry.names(), vec!["B", "C", "A"]);
	}

	#[test]
	fn test_replace_requires_an_existing_plugin() {
		let mut registry = PluginRegistry::new();
		let error = registry.replace(NamedPlugin::boxed("Ghost")).unwrap_err();
		assert!(matches!(error, TrackerError::PluginNotFound { .. }));
	}

	#[test]
	fn test_get_and_has() {
		let mut registry = PluginRegistry::new();
		registry.add(NamedPlugin::boxed("A")).unwrap();
		assert_eq!(registry.get("A").unwrap().plugin_name(), "A");
		assert!(registry.get("B").is_err());
		assert!(registry.has("A"));
		assert!(!registry.has("B"));
	}

	#[test]
	fn test_enrichment_is_order_dependent() {
		let mut registry = PluginRegistry::new();
		registry
			.add(Box::new(StackPlugin {
				name: "First",
				context_id: "outer",
			}))
			.unwrap();
		registry
			.add(Box::new(StackPlugin {
				name: "Second",
				context_id: "inner",
			}))
			.unwrap();

		let mut event = TrackerEvent::new("press-event");
		registry.enrich(&mut event);
		let ids: Vec<&str> = event
			.location_stack
			.iter()
			.map(|context| context.id.as_str())
			.collect();
		assert_eq!(ids, vec!["outer", "inner"]);
	}

	#[test]
	fn test_before_transport_skips_non_usable_plugins() {
		let mut registry = PluginRegistry::new();
		let usable = Arc::new(GatedPlugin {
			name: "Usable",
			usable: AtomicBool::new(true),
			before_transport_calls: AtomicUsize::new(0),
		});
		let muted = Arc::new(GatedPlugin {
			name: "Muted",
			usable: AtomicBool::new(false),
			before_transport_calls: AtomicUsize::new(0),
		});

		struct Shared(Arc<GatedPlugin>);
		impl TrackerPlugin for Shared {
			fn plugin_name(&self) -> &'static str {
				self.0.plugin_name()
			}
			fn is_usable(&self) -> bool {
				self.0.is_usable()
			}
			fn before_transport(&self, event: &mut TrackerEvent) {
				self.0.before_transport(event);
			}
		}

		registry.add(Box::new(Shared(usable.clone()))).unwrap();
		registry.add(Box::new(Shared(muted.clone()))).unwrap();

		let mut event = TrackerEvent::new("press-event");
		registry.before_transport(&mut event);
		assert_eq!(usable.before_transport_calls.load(Ordering::SeqCst), 1);
		assert_eq!(muted.before_transport_calls.load(Ordering::SeqCst), 0);
	}

	const NAMES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

	proptest! {
		// Any interleaving of add/remove/replace keeps names unique and
		// leaves untouched plugins in their relative order.
		#[test]
		fn names_stay_unique_and_ordered(ops in prop::collection::vec((0u8..3, 0usize..NAMES.len()), 0..40)) {
			let mut registry = PluginRegistry::new();
			let mut model: Vec<&'static str> = Vec::new();

			for (op, slot) in ops {
				let name = NAMES[slot];
				match op {
					0 => {
						let result = registry.add(NamedPlugin::boxed(name));
						if model.contains(&name) {
							prop_assert!(result.is_err());
						} else {
							prop_assert!(result.is_ok());
							model.push(name);
						}
					}
					1 => {
						let result = registry.remove(name);
						if let Some(position) = model.iter().position(|n| *n == name) {
							prop_assert!(result.is_ok());
							model.remove(position);
						} else {
							prop_assert!(result.is_err());
						}
					}
					_ => {
						let result = registry.replace(NamedPlugin::boxed(name));
						prop_assert_eq!(result.is_ok(), model.contains(&name));
					}
				}

				prop_assert_eq!(registry.names(), model.clone());
			}
		}
	}
}
