// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue storage backends.
//!
//! The store is the single source of truth for pending events: an ordered
//! list with append, non-destructive head reads and removal by identity.
//! The contract is asynchronous at the interface level even when a backend
//! completes synchronously underneath, so the queue stays uniform across
//! media. Each backend serializes its own internal read/remove cycles;
//! batch disjointness across concurrent queue runs is layered on top via
//! the read filter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use loom_tracker_core::{EventId, TrackerEvent};

use crate::error::Result;

/// Eligibility predicate applied during head reads; events rejected by the
/// filter are skipped without consuming batch capacity.
pub type EventFilter = dyn Fn(&TrackerEvent) -> bool + Send + Sync;

/// Trait for queue storage backends.
///
/// Implementations hold events in insertion order. `read` returns up to
/// `size` events from the head that pass the filter and must not remove
/// them; `delete` removes by event id wherever the events sit.
#[async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug {
	/// Identifier used in logs.
	fn store_name(&self) -> &'static str;

	/// Number of events currently stored.
	async fn len(&self) -> Result<usize>;

	/// Read up to `size` eligible events from the head, non-destructively.
	async fn read(&self, size: usize, filter: Option<&EventFilter>) -> Result<Vec<TrackerEvent>>;

	/// Append events, preserving insertion order.
	async fn write(&self, events: &[TrackerEvent]) -> Result<()>;

	/// Remove the events with the given ids.
	async fn delete(&self, ids: &[EventId]) -> Result<()>;
}

/// In-memory event store.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
	events: tokio::sync::RwLock<Vec<TrackerEvent>>,
}

impl MemoryQueueStore {
	/// Create a new empty in-memory store.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
	fn store_name(&self) -> &'static str {
		"MemoryQueueStore"
	}

	async fn len(&self) -> Result<usize> {
		Ok(self.events.read().await.len())
	}

	async fn read(&self, size: usize, filter: Option<&EventFilter>) -> Result<Vec<TrackerEvent>> {
		let events = self.events.read().await;
		Ok(events
			.iter()
			.filter(|event| filter.map_or(true, |eligible| eligible(event)))
			.take(size)
			.cloned()
			.collect())
	}

	async fn write(&self, events: &[TrackerEvent]) -> Result<()> {
		let mut stored = self.events.write().await;
		stored.extend_from_slice(events);
		Ok(())
	}

	async fn delete(&self, ids: &[EventId]) -> Result<()> {
		let mut stored = self.events.write().await;
		stored.retain(|event| !ids.contains(&event.id()));
		Ok(())
	}
}

/// File-backed event store with JSON format.
///
/// The whole pending list is kept as one JSON array and rewritten through a
/// temp file plus atomic rename, so a crash mid-write leaves the previous
/// snapshot intact. A missing file reads as empty.
#[derive(Debug)]
pub struct FileQueueStore {
	path: PathBuf,
	// serializes read-modify-write cycles
	io: tokio::sync::Mutex<()>,
}

impl FileQueueStore {
	/// Create a store persisting at the given path.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			io: tokio::sync::Mutex::new(()),
		}
	}

	/// Get the path to the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_events(&self) -> Result<Vec<TrackerEvent>> {
		if !self.path.exists() {
			return Ok(Vec::new());
		}

		let contents = fs::read_to_string(&self.path).await?;
		let events: Vec<TrackerEvent> = serde_json::from_str(&contents)?;
		Ok(events)
	}

	async fn write_events(&self, events: &[TrackerEvent]) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let contents = serde_json::to_string_pretty(events)?;

		let temp_path = self.path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path).await?;
		file.write_all(contents.as_bytes()).await?;
		file.sync_all().await?;
		drop(file);

		fs::rename(&temp_path, &self.path).await?;

		debug!(path = ?self.path, count = events.len(), "event queue written");
		Ok(())
	}
}

#[async_trait]
impl QueueStore for FileQueueStore {
	fn store_name(&self) -> &'static str {
		"FileQueueStore"
	}

	async fn len(&self) -> Result<usize> {
		let _guard = self.io.lock().await;
		Ok(self.read_events().await?.len())
	}

	async fn read(&self, size: usize, filter: Option<&EventFilter>) -> Result<Vec<TrackerEvent>> {
		let _guard = self.io.lock().await;
		let events = self.read_events().await?;
		Ok(events
			.into_iter()
			.filter(|event| filter.map_or(true, |eligible| eligible(event)))
			.take(size)
			.collect())
	}

	async fn write(&self, events: &[TrackerEvent]) -> Result<()> {
		let _guard = self.io.lock().await;
		let mut stored = self.read_events().await?;
		stored.extend_from_slice(events);
		self.write_events(&stored).await
	}

	async fn delete(&self, ids: &[EventId]) -> Result<()> {
		let _guard = self.io.lock().await;
		let mut stored = self.read_events().await?;
		stored.retain(|event| !ids.contains(&event.id()));
		self.write_events(&stored).await
	}
}
