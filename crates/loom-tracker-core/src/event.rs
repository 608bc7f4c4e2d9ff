// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracking event record and the collector wire payload.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{EventContexts, GlobalContext, LocationContext};

/// Event ID, unique per logical event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// A structured record of something that happened, carrying context.
///
/// The type tag and identity are fixed at construction; the two context
/// collections are the only mutable surface and are what enrichment appends
/// to. `time` is stamped by the tracker when it takes the event and is
/// corrected server-side against the payload's `transport_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerEvent {
	#[serde(rename = "_type")]
	event_type: String,
	id: EventId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	time: Option<i64>,
	/// Where the event originated, ordered outermost-first.
	#[serde(default)]
	pub location_stack: Vec<LocationContext>,
	/// Cross-cutting metadata; unordered.
	#[serde(default)]
	pub global_contexts: Vec<GlobalContext>,
}

impl TrackerEvent {
	/// A new event with a fresh id and empty context collections.
	pub fn new(event_type: impl Into<String>) -> Self {
		Self::with_contexts(event_type, EventContexts::new())
	}

	/// A new event seeded with the given context collections.
	pub fn with_contexts(event_type: impl Into<String>, contexts: EventContexts) -> Self {
		Self {
			event_type: event_type.into(),
			id: EventId::new(),
			time: None,
			location_stack: contexts.location_stack,
			global_contexts: contexts.global_contexts,
		}
	}

	pub fn event_type(&self) -> &str {
		&self.event_type
	}

	pub fn id(&self) -> EventId {
		self.id
	}

	/// Tracking timestamp in epoch milliseconds, if already stamped.
	pub fn time(&self) -> Option<i64> {
		self.time
	}

	pub fn set_time(&mut self, epoch_millis: i64) {
		self.time = Some(epoch_millis);
	}
}

/// Outbound body posted to the collector.
///
/// `transport_time` is the client clock at send time; the collector uses it
/// to correct each event's `time` for clock skew.
#[derive(Debug, Serialize)]
pub struct CollectorPayload<'a> {
	pub events: &'a [TrackerEvent],
	pub transport_time: i64,
}

impl<'a> CollectorPayload<'a> {
	/// Wrap a batch, stamping `transport_time` with the current clock.
	pub fn new(events: &'a [TrackerEvent]) -> Self {
		Self {
			events,
			transport_time: Utc::now().timestamp_millis(),
		}
	}
}
