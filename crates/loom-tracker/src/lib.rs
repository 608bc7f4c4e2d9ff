// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for Loom structured event tracking.
//!
//! This crate provides a tracker for capturing structured events, enriching
//! them with location and global contexts through a plugin pipeline, and
//! shipping them to a collector in resilient background batches.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_tracker::{LocationContext, Tracker, TrackerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize the tracker
//!     let tracker = Tracker::builder()
//!         .application_id("storefront")
//!         .endpoint("https://collector.example.com/events")
//!         .build()?;
//!
//!     // Track an event with a location
//!     let mut event = TrackerEvent::new("press-event");
//!     event.location_stack.push(LocationContext::root_location("home"));
//!     event.location_stack.push(LocationContext::content("buy-button"));
//!     tracker.track_event(event).await?;
//!
//!     // Shutdown gracefully (drains pending events)
//!     tracker.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Batching & Delivery
//!
//! Tracked events are appended to a queue and drained in batches by a
//! background task. This provides:
//!
//! - **Better performance**: Fewer HTTP requests
//! - **Resilience**: Failed batches stay queued and are retried in order
//! - **Non-blocking**: `track_event()` returns without waiting for the network
//!
//! The queue store is pluggable. Swap the default in-memory store for a
//! file-backed one and pending events survive restarts:
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_tracker::{EventQueue, FileQueueStore, QueueConfig, Tracker};
//!
//! let store = Arc::new(FileQueueStore::new("/var/lib/storefront/events.json"));
//! let tracker = Tracker::builder()
//!     .application_id("storefront")
//!     .endpoint("https://collector.example.com/events")
//!     .queue(EventQueue::with_config(store, QueueConfig::default()))
//!     .build()?;
//! ```
//!
//! Delivery composes from transports: the default stack retries a switch
//! over an HTTP sender with exponential backoff and jitter. Pass a custom
//! `Transport` to replace it wholesale.
//!
//! # Plugins
//!
//! Plugins hook three points of the pipeline: `enrich` mutates the event
//! right after capture, `validate` reports findings to the diagnostics sink
//! without ever blocking the event, and `before_transport` runs last, just
//! ahead of delivery. The default `ApplicationContextPlugin` stamps every
//! event with an `ApplicationContext` and validates that exactly one is
//! present.
//!
//! ```ignore
//! use loom_tracker::{GlobalContext, TrackerPlugin};
//! use loom_tracker::TrackerEvent;
//!
//! struct SessionPlugin { session_id: String }
//!
//! impl TrackerPlugin for SessionPlugin {
//!     fn plugin_name(&self) -> &'static str { "SessionPlugin" }
//!     fn enrich(&self, event: &mut TrackerEvent) {
//!         event.global_contexts.push(GlobalContext::new("SessionContext", &self.session_id));
//!     }
//! }
//!
//! let tracker = Tracker::builder()
//!     .application_id("storefront")
//!     .endpoint("https://collector.example.com/events")
//!     .add_plugin(Box::new(SessionPlugin { session_id: "sess-1".into() }))
//!     .build()?;
//! ```
//!
//! # Graceful Shutdown
//!
//! Always call `shutdown()` before your application exits to ensure pending
//! events are drained:
//!
//! ```ignore
//! tracker.shutdown().await?;
//! ```
//!
//! # Error Handling
//!
//! Delivery uses retries with exponential backoff for transient failures,
//! and failed batches stay queued. Configuration mistakes (missing
//! application id, conflicting transports, duplicate plugin names) are
//! returned immediately:
//!
//! ```ignore
//! use loom_tracker::TrackerError;
//!
//! match tracker.track_event(event).await {
//!     Ok(enriched) => println!("tracked {}", enriched.id()),
//!     Err(TrackerError::Shutdown) => eprintln!("tracker has been shut down"),
//!     Err(e) => eprintln!("unexpected error: {}", e),
//! }
//! ```

pub mod application_context;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod rules;
pub mod store;
pub mod switch;
pub mod tracker;
pub mod transport;

pub use application_context::ApplicationContextPlugin;
pub use diagnostics::{
	DiagnosticEntry, DiagnosticsSink, MemoryDiagnostics, NoopDiagnostics, TracingDiagnostics,
};
pub use error::{Result, RetryableError, TrackerError};
pub use http::HttpTransport;
pub use plugin::TrackerPlugin;
pub use queue::{EventQueue, ProcessFunction, QueueConfig};
pub use registry::PluginRegistry;
pub use retry::{RetryAttempt, RetryConfig, RetryTransport};
pub use rules::{
	ContextScope, PositionRule, RequiresContextRule, UniqueContextRule, ValidationRule,
};
pub use store::{EventFilter, FileQueueStore, MemoryQueueStore, QueueStore};
pub use switch::TransportSwitch;
pub use tracker::{Tracker, TrackerBuilder};
pub use transport::{DebugTransport, Transport};

// Re-export types from loom-tracker-core that users may need
pub use loom_tracker_core::{
	context_types, CollectorPayload, EventContexts, EventId, GlobalContext, LocationContext,
	TrackerEvent,
};
