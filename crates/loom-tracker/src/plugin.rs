// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker plugin contract.

use loom_tracker_core::TrackerEvent;

/// A pluggable unit that can enrich or validate events and gate its own
/// applicability.
///
/// Plugins are constructed once at tracker-configuration time and live for
/// the tracker's lifetime. They are stateless between events unless they
/// explicitly cache (a one-time diagnostic latch, a prebuilt context).
///
/// Each lifecycle hook is optional: the default implementation is a no-op,
/// and a plugin that leaves a hook at its default is indistinguishable from
/// one without that capability.
pub trait TrackerPlugin: Send + Sync {
	/// Unique key within a [`PluginRegistry`](crate::registry::PluginRegistry).
	fn plugin_name(&self) -> &'static str;

	/// Pure applicability predicate, re-evaluated on every pass that gates
	/// on it; the environment can change between calls.
	fn is_usable(&self) -> bool {
		true
	}

	/// Add or adjust contexts on the event. Runs for every plugin in
	/// registry order, regardless of usability, so fallback contexts can
	/// always be supplied; later plugins observe earlier plugins' additions.
	fn enrich(&self, _event: &mut TrackerEvent) {}

	/// Inspect the event and report findings through the plugin's
	/// diagnostics sink. Must not mutate the event and must not fail;
	/// validation is developer feedback, never runtime enforcement.
	fn validate(&self, _event: &TrackerEvent) {}

	/// Last touch before the event leaves the pipeline (queue hand-off or
	/// direct send). Only invoked while the plugin is usable.
	fn before_transport(&self, _event: &mut TrackerEvent) {}
}
