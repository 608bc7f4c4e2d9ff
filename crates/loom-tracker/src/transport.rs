// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery abstraction for tracked events.
//!
//! Transports compose: `RetryTransport` wraps any inner transport,
//! `TransportSwitch` fans out over an ordered candidate list, and direct
//! senders like `HttpTransport` sit at the bottom. The tracker only ever
//! sees the outermost layer.

use async_trait::async_trait;
use tracing::debug;

use loom_tracker_core::TrackerEvent;

use crate::error::Result;

/// A delivery channel for batches of tracked events.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Identifier used in logs and diagnostics.
	fn transport_name(&self) -> &'static str;

	/// Whether the transport can currently deliver.
	///
	/// Checked at send time, not construction time. An unusable transport
	/// is skipped by composition layers and the tracker.
	fn is_usable(&self) -> bool {
		true
	}

	/// Deliver a batch. An empty batch must succeed without side effects.
	async fn handle(&self, events: &[TrackerEvent]) -> Result<()>;
}

/// Development transport that logs batches instead of sending them.
///
/// Always usable and never fails, which makes it a convenient switch
/// fallback when no collector is reachable.
#[derive(Debug, Default)]
pub struct DebugTransport;

impl DebugTransport {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Transport for DebugTransport {
	fn transport_name(&self) -> &'static str {
		"DebugTransport"
	}

	async fn handle(&self, events: &[TrackerEvent]) -> Result<()> {
		for event in events {
			debug!(
				event_type = event.event_type(),
				event_id = %event.id(),
				locations = event.location_stack.len(),
				globals = event.global_contexts.len(),
				"event"
			);
		}
		Ok(())
	}
}
