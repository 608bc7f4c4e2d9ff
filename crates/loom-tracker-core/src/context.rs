// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Context value objects attached to tracking events.
//!
//! Contexts come in two kinds with different semantics:
//! - [`LocationContext`] is hierarchical: an event's location stack is
//!   ordered outermost-first and describes where in the UI/navigation tree
//!   the event originated.
//! - [`GlobalContext`] is flat, cross-cutting metadata: insertion order is
//!   irrelevant, and for single-instance discriminants a duplicate is a
//!   validation finding.
//!
//! Both are immutable value objects once attached to an event. The kind is
//! carried by the Rust type itself, so a global context can never be pushed
//! onto a location stack by accident.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known context discriminant (`_type`) strings.
pub mod context_types {
	pub const APPLICATION: &str = "ApplicationContext";
	pub const PATH: &str = "PathContext";
	pub const ROOT_LOCATION: &str = "RootLocationContext";
	pub const CONTENT: &str = "ContentContext";
}

/// A hierarchical context describing one level of the location stack.
///
/// The `id` must be unique among siblings at the same depth of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
	/// Discriminant identifying the context kind.
	#[serde(rename = "_type")]
	pub context_type: String,
	/// Stable identity within the parent scope.
	pub id: String,
	/// Discriminant-specific fields, carried through verbatim.
	#[serde(flatten)]
	pub attributes: Map<String, Value>,
}

impl LocationContext {
	pub fn new(context_type: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			context_type: context_type.into(),
			id: id.into(),
			attributes: Map::new(),
		}
	}

	/// The root of a location stack, e.g. the top-level view or screen.
	pub fn root_location(id: impl Into<String>) -> Self {
		Self::new(context_types::ROOT_LOCATION, id)
	}

	/// A logical content section nested somewhere below the root.
	pub fn content(id: impl Into<String>) -> Self {
		Self::new(context_types::CONTENT, id)
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}
}

/// A flat, cross-cutting context attached to an event's global collection.
///
/// For single-instance discriminants the `_type` + `id` pair must be unique
/// across the event's global set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalContext {
	/// Discriminant identifying the context kind.
	#[serde(rename = "_type")]
	pub context_type: String,
	/// Stable identity within the discriminant's scope.
	pub id: String,
	/// Discriminant-specific fields, carried through verbatim.
	#[serde(flatten)]
	pub attributes: Map<String, Value>,
}

impl GlobalContext {
	pub fn new(context_type: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			context_type: context_type.into(),
			id: id.into(),
			attributes: Map::new(),
		}
	}

	/// The application identity context; `id` is the application id.
	pub fn application(id: impl Into<String>) -> Self {
		Self::new(context_types::APPLICATION, id)
	}

	/// The current path/route context; `id` is the URL or route string.
	pub fn path(id: impl Into<String>) -> Self {
		Self::new(context_types::PATH, id)
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}
}

/// The pair of ambient context collections an event is seeded with.
///
/// A tracker carries one of these and prepends it to every tracked event;
/// callers may also construct events from one directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContexts {
	#[serde(default)]
	pub location_stack: Vec<LocationContext>,
	#[serde(default)]
	pub global_contexts: Vec<GlobalContext>,
}

impl EventContexts {
	pub fn new() -> Self {
		Self::default()
	}
}
