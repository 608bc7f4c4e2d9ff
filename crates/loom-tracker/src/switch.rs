// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered fallback across candidate transports.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use loom_tracker_core::TrackerEvent;

use crate::error::{Result, TrackerError};
use crate::transport::Transport;

/// Delegates each batch to the first usable transport of an ordered list.
///
/// Usability is re-evaluated on every `handle` call rather than captured at
/// construction, so candidates may come and go while the tracker runs.
pub struct TransportSwitch {
	transports: Vec<Arc<dyn Transport>>,
}

impl TransportSwitch {
	pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
		Self { transports }
	}

	fn first_usable(&self) -> Option<&Arc<dyn Transport>> {
		self
			.transports
			.iter()
			.find(|transport| transport.is_usable())
	}
}

#[async_trait]
impl Transport for TransportSwitch {
	fn transport_name(&self) -> &'static str {
		"TransportSwitch"
	}

	fn is_usable(&self) -> bool {
		self.first_usable().is_some()
	}

	async fn handle(&self, events: &[TrackerEvent]) -> Result<()> {
		match self.first_usable() {
			Some(transport) => {
				debug!(delegate = transport.transport_name(), "delegating batch");
				transport.handle(events).await
			}
			None => Err(TrackerError::NoUsableTransport),
		}
	}
}
