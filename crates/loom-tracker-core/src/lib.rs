// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom event-tracking system.
//!
//! This crate provides the shared data model for structured tracking events:
//! the event record itself, the typed context objects that ride along with it
//! (an ordered location stack plus a flat global collection), and the wire
//! payload posted to the collector. It is consumed by the client SDK
//! (`loom-tracker`) and by anything collector-side that needs to speak the
//! same shapes.
//!
//! # Overview
//!
//! The tracking data model consists of:
//! - [`TrackerEvent`] with an immutable type tag and id, mutable context
//!   collections, and an optional tracking timestamp
//! - [`LocationContext`] and [`GlobalContext`] value objects with
//!   constructors for the well-known discriminants
//! - [`EventContexts`] carrying the ambient context pair a tracker seeds
//!   events with
//! - [`CollectorPayload`] as the `{ events, transport_time }` wire body

pub mod context;
pub mod event;

pub use context::{context_types, EventContexts, GlobalContext, LocationContext};
pub use event::{CollectorPayload, EventId, TrackerEvent};
