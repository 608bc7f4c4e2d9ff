// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Track structured events using the loom-tracker SDK.
//!
//! Run with:
//!   cargo run --example track -p loom-tracker

use loom_tracker::{
	GlobalContext, LocationContext, Tracker, TrackerEvent, TracingDiagnostics,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "loom_tracker=debug".into()),
		)
		.init();

	// Configure from environment or use defaults for testing
	let endpoint = std::env::var("LOOM_COLLECTOR_URL")
		.unwrap_or_else(|_| "https://loom.ghuntley.com/api/events".to_string());

	println!("Initializing tracker...");
	println!("  Endpoint: {}", endpoint);

	// Build the tracker with an ambient root location
	let tracker = Tracker::builder()
		.application_id("loom-tracker-example")
		.endpoint(&endpoint)
		.location_stack(vec![LocationContext::root_location("home")])
		.diagnostics(Arc::new(TracingDiagnostics))
		.build()?;

	// Track a press on a content section of the home screen
	let mut press = TrackerEvent::new("press-event");
	press.location_stack.push(LocationContext::content("buy-button"));
	let press = tracker.track_event(press).await?;

	println!("\nTracked press-event");
	println!("  Event ID: {}", press.id());
	println!("  Location: {:?}", press.location_stack.iter().map(|c| c.id.as_str()).collect::<Vec<_>>());

	// Track a navigation carrying the current route as a global context
	let mut visible = TrackerEvent::new("visible-event");
	visible
		.global_contexts
		.push(GlobalContext::path("/checkout"));
	let visible = tracker.track_event(visible).await?;

	println!("\nTracked visible-event");
	println!("  Event ID: {}", visible.id());
	println!("  Globals: {}", visible.global_contexts.len());

	// Shutdown (drains the queue)
	tracker.shutdown().await?;
	println!("\nTracker shutdown complete.");

	Ok(())
}
