// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batching queue between event tracking and delivery.
//!
//! Events are pushed into a [`QueueStore`] and drained in FIFO batches by
//! `run`, which is expected to be invoked repeatedly (the tracker spawns a
//! ticker for this). A batch is only deleted from the store after the
//! process function reports success, so delivery failures leave the events
//! queued for a later run. Batches handed to in-flight process calls are
//! tracked in a checked-out set, keeping overlapping runs disjoint without
//! locking the store for the duration of delivery.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use loom_tracker_core::{EventId, TrackerEvent};

use crate::error::{Result, TrackerError};
use crate::store::{EventFilter, QueueStore};

/// Batching and pacing parameters for an [`EventQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Maximum number of events handed to the process function per run.
	pub batch_size: usize,
	/// Minimum interval between consecutive batch dispatches.
	pub batch_delay: Duration,
	/// Maximum number of concurrently in-flight process calls.
	pub concurrency: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			batch_size: 10,
			batch_delay: Duration::from_secs(1),
			concurrency: 4,
		}
	}
}

/// Consumer of drained batches, typically a transport adapter.
///
/// A `Err` return means the whole batch failed and will be retried on a
/// later run; implementations should retry transient failures internally
/// before giving up.
#[async_trait]
pub trait ProcessFunction: Send + Sync {
	async fn process(&self, batch: Vec<TrackerEvent>) -> Result<()>;
}

/// FIFO event queue with batched, throttled, bounded-concurrency draining.
pub struct EventQueue {
	store: Arc<dyn QueueStore>,
	config: QueueConfig,
	process: RwLock<Option<Arc<dyn ProcessFunction>>>,
	/// Ids currently handed to an in-flight process call.
	processing: tokio::sync::Mutex<HashSet<EventId>>,
	in_flight: AtomicUsize,
	/// Guards the read-and-mark section of `run`.
	running: AtomicBool,
	last_run: tokio::sync::Mutex<Option<Instant>>,
}

impl EventQueue {
	/// Create a queue over the given store with default configuration.
	pub fn new(store: Arc<dyn QueueStore>) -> Self {
		Self::with_config(store, QueueConfig::default())
	}

	/// Create a queue over the given store with explicit configuration.
	pub fn with_config(store: Arc<dyn QueueStore>, config: QueueConfig) -> Self {
		Self {
			store,
			config,
			process: RwLock::new(None),
			processing: tokio::sync::Mutex::new(HashSet::new()),
			in_flight: AtomicUsize::new(0),
			running: AtomicBool::new(false),
			last_run: tokio::sync::Mutex::new(None),
		}
	}

	pub fn config(&self) -> &QueueConfig {
		&self.config
	}

	pub fn store(&self) -> &dyn QueueStore {
		self.store.as_ref()
	}

	/// Bind the process function invoked on drained batches.
	///
	/// Must be called before `run`, `flush` or `flush_within`; rebinding
	/// later only affects batches drained afterwards.
	pub fn set_process_function(&self, process: Arc<dyn ProcessFunction>) {
		let mut slot = self
			.process
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		*slot = Some(process);
	}

	fn process_function(&self) -> Option<Arc<dyn ProcessFunction>> {
		self.process
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}

	/// Append events to the queue in order.
	pub async fn push(&self, events: Vec<TrackerEvent>) -> Result<()> {
		self.store.write(&events).await
	}

	/// Number of events currently queued, including checked-out ones.
	pub async fn len(&self) -> Result<usize> {
		self.store.len().await
	}

	pub async fn is_empty(&self) -> Result<bool> {
		Ok(self.len().await? == 0)
	}

	/// Drain and process at most one batch.
	///
	/// Returns an error only when no process function is bound. A run that
	/// is throttled, saturated, raced by another run or left with nothing
	/// eligible to read is an ordinary no-op, and a batch whose delivery
	/// fails is retained in the store for a later run.
	pub async fn run(&self) -> Result<()> {
		let process = self
			.process_function()
			.ok_or(TrackerError::ProcessFunctionNotSet)?;

		if self.running.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		if self.in_flight.load(Ordering::SeqCst) >= self.config.concurrency {
			self.running.store(false, Ordering::SeqCst);
			return Ok(());
		}

		if !self.batch_delay_elapsed().await {
			self.running.store(false, Ordering::SeqCst);
			return Ok(());
		}

		let batch = match self.checked_out_batch(self.config.batch_size).await {
			Ok(batch) => batch,
			Err(error) => {
				self.running.store(false, Ordering::SeqCst);
				warn!(store = self.store.store_name(), %error, "queue read failed");
				return Ok(());
			}
		};

		if batch.is_empty() {
			self.running.store(false, Ordering::SeqCst);
			return Ok(());
		}

		self.in_flight.fetch_add(1, Ordering::SeqCst);
		*self.last_run.lock().await = Some(Instant::now());
		self.running.store(false, Ordering::SeqCst);

		let ids: Vec<EventId> = batch.iter().map(|event| event.id()).collect();
		match process.process(batch).await {
			Ok(()) => {
				if let Err(error) = self.store.delete(&ids).await {
					warn!(
						store = self.store.store_name(),
						%error,
						"failed to delete processed events; they may be delivered again"
					);
				}
			}
			Err(error) => {
				debug!(count = ids.len(), %error, "batch delivery failed; events retained");
			}
		}

		self.release(&ids).await;
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
		Ok(())
	}

	/// Drain the queue to empty, ignoring throttling and saturation.
	///
	/// Unlike `run`, delivery and store errors are propagated and stop the
	/// drain; the failed batch stays queued.
	pub async fn flush(&self) -> Result<()> {
		let process = self
			.process_function()
			.ok_or(TrackerError::ProcessFunctionNotSet)?;

		loop {
			let batch = self.checked_out_batch(self.config.batch_size).await?;
			if batch.is_empty() {
				return Ok(());
			}

			let ids: Vec<EventId> = batch.iter().map(|event| event.id()).collect();
			match process.process(batch).await {
				Ok(()) => {
					// delete before releasing, so a concurrently ticking run
					// can never re-read a batch that was already delivered
					let deleted = self.store.delete(&ids).await;
					self.release(&ids).await;
					deleted?;
				}
				Err(error) => {
					self.release(&ids).await;
					return Err(error);
				}
			}
		}
	}

	/// Drain the queue to empty, giving up after `limit`.
	///
	/// The timeout covers the whole drain. A batch whose delivery is cut
	/// short is released back to the queue before the error is returned, so
	/// a later flush can pick it up again.
	pub async fn flush_within(&self, limit: Duration) -> Result<()> {
		let process = self
			.process_function()
			.ok_or(TrackerError::ProcessFunctionNotSet)?;
		let deadline = Instant::now() + limit;

		loop {
			let batch = self.checked_out_batch(self.config.batch_size).await?;
			if batch.is_empty() {
				return Ok(());
			}

			let ids: Vec<EventId> = batch.iter().map(|event| event.id()).collect();
			let remaining = deadline.saturating_duration_since(Instant::now());
			// the timeout wraps only the delivery await, so the ids are
			// always released afterwards and never leak into the
			// checked-out set
			match tokio::time::timeout(remaining, process.process(batch)).await {
				Ok(Ok(())) => {
					let deleted = self.store.delete(&ids).await;
					self.release(&ids).await;
					deleted?;
				}
				Ok(Err(error)) => {
					self.release(&ids).await;
					return Err(error);
				}
				Err(_) => {
					self.release(&ids).await;
					return Err(TrackerError::FlushTimedOut(limit));
				}
			}
		}
	}

	async fn batch_delay_elapsed(&self) -> bool {
		let last_run = self.last_run.lock().await;
		match *last_run {
			Some(last) => last.elapsed() >= self.config.batch_delay,
			None => true,
		}
	}

	/// Read up to `size` events not already checked out and mark them.
	async fn checked_out_batch(&self, size: usize) -> Result<Vec<TrackerEvent>> {
		let mut processing = self.processing.lock().await;
		let excluded = processing.clone();
		let eligible = move |event: &TrackerEvent| !excluded.contains(&event.id());
		let filter: &EventFilter = &eligible;
		let batch = self.store.read(size, Some(filter)).await?;
		processing.extend(batch.iter().map(|event| event.id()));
		Ok(batch)
	}

	async fn release(&self, ids: &[EventId]) {
		let mut processing = self.processing.lock().await;
		for id in ids {
			processing.remove(id);
		}
	}
}

impl std::fmt::Debug for EventQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventQueue")
			.field("store", &self.store.store_name())
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryQueueStore;

	#[derive(Debug, Default)]
	struct RecordingProcessor {
		batches: std::sync::Mutex<Vec<Vec<TrackerEvent>>>,
		fail: AtomicBool,
		calls: AtomicUsize,
		delay: Option<Duration>,
	}

	impl RecordingProcessor {
		fn new() -> Arc<Self> {
			Arc::new(Self::default())
		}

		fn slow(delay: Duration) -> Arc<Self> {
			Arc::new(Self {
				delay: Some(delay),
				..Self::default()
			})
		}

		fn batches(&self) -> Vec<Vec<TrackerEvent>> {
			self.batches.lock().unwrap().clone()
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		fn set_fail(&self, fail: bool) {
			self.fail.store(fail, Ordering::SeqCst);
		}
	}

	#[async_trait]
	impl ProcessFunction for RecordingProcessor {
		async fn process(&self, batch: Vec<TrackerEvent>) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.fail.load(Ordering::SeqCst) {
				return Err(TrackerError::ServerError {
					status: 500,
					message: "Unavailable".to_string(),
				});
			}
			self.batches.lock().unwrap().push(batch);
			Ok(())
		}
	}

	fn unthrottled(batch_size: usize) -> QueueConfig {
		QueueConfig {
			batch_size,
			batch_delay: Duration::ZERO,
			concurrency: 4,
		}
	}

	fn events(types: &[&str]) -> Vec<TrackerEvent> {
		types.iter().copied().map(TrackerEvent::new).collect()
	}

	#[tokio::test]
	async fn test_run_without_process_function_is_an_error() {
		let queue = EventQueue::new(Arc::new(MemoryQueueStore::new()));
		let error = queue.run().await.unwrap_err();
		assert!(matches!(error, TrackerError::ProcessFunctionNotSet));
	}

	#[tokio::test]
	async fn test_run_delivers_events_in_fifo_order() {
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), unthrottled(1));
		let processor = RecordingProcessor::new();
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second"])).await.unwrap();
		queue.run().await.unwrap();
		queue.run().await.unwrap();

		let batches = processor.batches();
		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0][0].event_type(), "first");
		assert_eq!(batches[1][0].event_type(), "second");
		assert_eq!(queue.len().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_run_batches_up_to_the_configured_size() {
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), unthrottled(2));
		let processor = RecordingProcessor::new();
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second", "third"])).await.unwrap();
		queue.run().await.unwrap();
		queue.run().await.unwrap();

		let batches = processor.batches();
		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0].len(), 2);
		assert_eq!(batches[1].len(), 1);
		assert_eq!(batches[1][0].event_type(), "third");
	}

	#[tokio::test]
	async fn test_failed_batches_stay_queued_in_order() {
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), unthrottled(10));
		let processor = RecordingProcessor::new();
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second"])).await.unwrap();
		processor.set_fail(true);
		queue.run().await.unwrap();
		assert_eq!(queue.len().await.unwrap(), 2);
		assert!(processor.batches().is_empty());

		processor.set_fail(false);
		queue.run().await.unwrap();
		let batches = processor.batches();
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0][0].event_type(), "first");
		assert_eq!(batches[0][1].event_type(), "second");
		assert_eq!(queue.len().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_batch_delay_throttles_consecutive_runs() {
		let config = QueueConfig {
			batch_size: 1,
			batch_delay: Duration::from_secs(3600),
			concurrency: 4,
		};
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), config);
		let processor = RecordingProcessor::new();
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second"])).await.unwrap();
		queue.run().await.unwrap();
		queue.run().await.unwrap();

		assert_eq!(processor.calls(), 1);
		assert_eq!(queue.len().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_concurrent_runs_never_share_events() {
		let config = QueueConfig {
			batch_size: 1,
			batch_delay: Duration::ZERO,
			concurrency: 2,
		};
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), config);
		let processor = RecordingProcessor::slow(Duration::from_millis(50));
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second"])).await.unwrap();
		let (a, b) = tokio::join!(queue.run(), queue.run());
		a.unwrap();
		b.unwrap();

		let batches = processor.batches();
		assert_eq!(batches.len(), 2);
		let mut seen: Vec<&str> = batches.iter().map(|batch| batch[0].event_type()).collect();
		seen.sort_unstable();
		assert_eq!(seen, vec!["first", "second"]);
		assert_eq!(queue.len().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_saturated_queue_skips_the_run() {
		let config = QueueConfig {
			batch_size: 1,
			batch_delay: Duration::ZERO,
			concurrency: 1,
		};
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), config);
		let processor = RecordingProcessor::slow(Duration::from_millis(50));
		queue.set_process_function(processor.clone());

		queue.push(events(&["first", "second"])).await.unwrap();
		let (a, b) = tokio::join!(queue.run(), queue.run());
		a.unwrap();
		b.unwrap();

		assert_eq!(processor.calls(), 1);
		assert_eq!(queue.len().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_flush_drains_the_queue_ignoring_batch_delay() {
		let config = QueueConfig {
			batch_size: 2,
			batch_delay: Duration::from_secs(3600),
			concurrency: 4,
		};
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), config);
		let processor = RecordingProcessor::new();
		queue.set_process_function(processor.clone());

		queue
			.push(events(&["first", "second", "third", "fourth", "fifth"]))
			.await
			.unwrap();
		queue.run().await.unwrap();
		queue.flush().await.unwrap();

		assert_eq!(processor.calls(), 3);
		assert_eq!(queue.len().await.unwrap(), 0);
		let batches = processor.batches();
		assert_eq!(batches[2][0].event_type(), "fifth");
	}

	#[tokio::test]
	async fn test_flush_stops_at_the_first_failure() {
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), unthrottled(2));
		let processor = RecordingProcessor::new();
		processor.set_fail(true);
		queue.set_process_function(processor.clone());

		queue
			.push(events(&["first", "second", "third", "fourth"]))
			.await
			.unwrap();
		let error = queue.flush().await.unwrap_err();
		assert!(matches!(error, TrackerError::ServerError { .. }));
		assert_eq!(processor.calls(), 1);
		assert_eq!(queue.len().await.unwrap(), 4);
	}

	#[tokio::test]
	async fn test_flush_within_times_out_and_releases_the_batch() {
		let queue = EventQueue::with_config(Arc::new(MemoryQueueStore::new()), unthrottled(10));
		let slow = RecordingProcessor::slow(Duration::from_millis(200));
		queue.set_process_function(slow);

		queue.push(events(&["first", "second"])).await.unwrap();
		let error = queue.flush_within(Duration::from_millis(50)).await.unwrap_err();
		assert!(matches!(error, TrackerError::FlushTimedOut(_)));
		assert_eq!(queue.len().await.unwrap(), 2);

		// the timed-out batch must not stay checked out
		let fast = RecordingProcessor::new();
		queue.set_process_function(fast.clone());
		queue.flush().await.unwrap();
		assert_eq!(fast.batches().len(), 1);
		assert_eq!(fast.batches()[0].len(), 2);
		assert_eq!(queue.len().await.unwrap(), 0);
	}
}
