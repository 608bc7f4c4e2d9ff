// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker construction and event orchestration.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use loom_tracker_core::{GlobalContext, LocationContext, TrackerEvent};

use crate::application_context::ApplicationContextPlugin;
use crate::diagnostics::{DiagnosticsSink, NoopDiagnostics};
use crate::error::{Result, TrackerError};
use crate::http::HttpTransport;
use crate::plugin::TrackerPlugin;
use crate::queue::{EventQueue, ProcessFunction};
use crate::registry::PluginRegistry;
use crate::retry::RetryTransport;
use crate::store::MemoryQueueStore;
use crate::switch::TransportSwitch;
use crate::transport::Transport;

/// Upper bound for the shutdown drain.
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
/// Floor for the runner tick, so a zero `batch_delay` cannot busy-spin.
const MIN_TICK: Duration = Duration::from_millis(10);

/// Queue process function that delivers batches through the tracker's
/// transport.
struct TransportProcessFunction {
	transport: Arc<dyn Transport>,
}

#[async_trait]
impl ProcessFunction for TransportProcessFunction {
	async fn process(&self, batch: Vec<TrackerEvent>) -> Result<()> {
		self.transport.handle(&batch).await
	}
}

/// Builder for constructing a [`Tracker`].
pub struct TrackerBuilder {
	application_id: Option<String>,
	tracker_id: Option<String>,
	endpoint: Option<String>,
	transport: Option<Arc<dyn Transport>>,
	queue: Option<EventQueue>,
	plugins: Option<Vec<Box<dyn TrackerPlugin>>>,
	extra_plugins: Vec<Box<dyn TrackerPlugin>>,
	track_application_context: bool,
	location_stack: Vec<LocationContext>,
	global_contexts: Vec<GlobalContext>,
	diagnostics: Arc<dyn DiagnosticsSink>,
	flush_timeout: Duration,
}

impl TrackerBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			application_id: None,
			tracker_id: None,
			endpoint: None,
			transport: None,
			queue: None,
			plugins: None,
			extra_plugins: Vec::new(),
			track_application_context: true,
			location_stack: Vec::new(),
			global_contexts: Vec::new(),
			diagnostics: Arc::new(NoopDiagnostics),
			flush_timeout: DEFAULT_FLUSH_TIMEOUT,
		}
	}

	/// Sets the application identifier stamped on every event. Required.
	pub fn application_id(mut self, id: impl Into<String>) -> Self {
		self.application_id = Some(id.into());
		self
	}

	/// Sets the tracker instance name, used in logs.
	///
	/// Defaults to the application id.
	pub fn tracker_id(mut self, id: impl Into<String>) -> Self {
		self.tracker_id = Some(id.into());
		self
	}

	/// Sets the collector endpoint and selects the default delivery stack:
	/// a retrying switch over an HTTP sender, fed from an in-memory queue.
	///
	/// Mutually exclusive with [`transport`](Self::transport).
	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	/// Sets a custom transport. Events go to it directly unless a queue is
	/// also configured.
	///
	/// Mutually exclusive with [`endpoint`](Self::endpoint).
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets an explicit event queue, overriding the default one.
	pub fn queue(mut self, queue: EventQueue) -> Self {
		self.queue = Some(queue);
		self
	}

	/// Replaces the default plugin list entirely.
	pub fn plugins(mut self, plugins: Vec<Box<dyn TrackerPlugin>>) -> Self {
		self.plugins = Some(plugins);
		self
	}

	/// Appends a plugin to whatever list is active.
	pub fn add_plugin(mut self, plugin: Box<dyn TrackerPlugin>) -> Self {
		self.extra_plugins.push(plugin);
		self
	}

	/// Enables or disables the default `ApplicationContextPlugin`.
	///
	/// Enabled by default; ignored when [`plugins`](Self::plugins) replaces
	/// the list.
	pub fn track_application_context(mut self, enabled: bool) -> Self {
		self.track_application_context = enabled;
		self
	}

	/// Sets ambient location contexts prepended to every tracked event's
	/// location stack, outermost first.
	pub fn location_stack(mut self, contexts: Vec<LocationContext>) -> Self {
		self.location_stack = contexts;
		self
	}

	/// Sets ambient global contexts prepended to every tracked event's
	/// global contexts.
	pub fn global_contexts(mut self, contexts: Vec<GlobalContext>) -> Self {
		self.global_contexts = contexts;
		self
	}

	/// Sets the diagnostics sink for validation findings.
	pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
		self.diagnostics = diagnostics;
		self
	}

	/// Sets the upper bound for the shutdown drain. Default 10s.
	pub fn flush_timeout(mut self, timeout: Duration) -> Self {
		self.flush_timeout = timeout;
		self
	}

	/// Builds the Tracker.
	///
	/// When a queue is involved this spawns the background runner task and
	/// must therefore be called within a tokio runtime.
	pub fn build(self) -> Result<Tracker> {
		let application_id = match self.application_id {
			Some(id) if !id.is_empty() => id,
			Some(_) => {
				return Err(TrackerError::InvalidApplicationId(
					"application id must not be empty".to_string(),
				))
			}
			None => {
				return Err(TrackerError::InvalidApplicationId(
					"application id is required".to_string(),
				))
			}
		};
		let tracker_id = self.tracker_id.unwrap_or_else(|| application_id.clone());

		let (transport, default_queue) = match (self.endpoint, self.transport) {
			(Some(endpoint), None) => {
				let http = HttpTransport::new(endpoint)?;
				let candidates: Vec<Arc<dyn Transport>> = vec![Arc::new(http)];
				let switch = TransportSwitch::new(candidates);
				let retry: Arc<dyn Transport> = Arc::new(RetryTransport::new(Arc::new(switch)));
				(retry, true)
			}
			(None, Some(transport)) => (transport, false),
			(None, None) => return Err(TrackerError::MissingTransport),
			(Some(_), Some(_)) => return Err(TrackerError::TransportConflict),
		};

		let queue = match self.queue {
			Some(queue) => Some(Arc::new(queue)),
			None if default_queue => Some(Arc::new(EventQueue::new(Arc::new(
				MemoryQueueStore::new(),
			)))),
			None => None,
		};

		let mut plugins = PluginRegistry::with_diagnostics(self.diagnostics.clone());
		match self.plugins {
			Some(custom) => {
				for plugin in custom {
					plugins.add(plugin)?;
				}
			}
			None => {
				if self.track_application_context {
					plugins.add(Box::new(
						ApplicationContextPlugin::new(application_id.clone())
							.with_diagnostics(self.diagnostics.clone()),
					))?;
				}
			}
		}
		for plugin in self.extra_plugins {
			plugins.add(plugin)?;
		}

		let shutdown_notify = Arc::new(Notify::new());
		let runner = match &queue {
			Some(queue) => {
				queue.set_process_function(Arc::new(TransportProcessFunction {
					transport: transport.clone(),
				}));
				Some(spawn_runner(queue.clone(), shutdown_notify.clone()))
			}
			None => None,
		};

		info!(
			application_id = %application_id,
			tracker_id = %tracker_id,
			transport = transport.transport_name(),
			queued = queue.is_some(),
			"Tracker initialized"
		);

		Ok(Tracker {
			application_id,
			tracker_id,
			transport,
			queue,
			plugins,
			location_stack: self.location_stack,
			global_contexts: self.global_contexts,
			diagnostics: self.diagnostics,
			active: AtomicBool::new(true),
			closed: AtomicBool::new(false),
			flush_timeout: self.flush_timeout,
			shutdown_notify,
			runner: Mutex::new(runner),
		})
	}
}

impl Default for TrackerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Periodically drives `queue.run()` until shutdown is signalled.
fn spawn_runner(queue: Arc<EventQueue>, shutdown: Arc<Notify>) -> JoinHandle<()> {
	let tick = queue.config().batch_delay.max(MIN_TICK);
	tokio::spawn(async move {
		debug!(tick_ms = tick.as_millis(), "queue runner started");
		loop {
			tokio::select! {
				_ = tokio::time::sleep(tick) => {
					if let Err(error) = queue.run().await {
						warn!(%error, "queue run failed");
					}
				}
				_ = shutdown.notified() => {
					break;
				}
			}
		}
		debug!("queue runner stopped");
	})
}

/// Client for tracking structured events and shipping them to a collector.
///
/// # Example
///
/// ```ignore
/// use loom_tracker::{Tracker, TrackerEvent};
///
/// let tracker = Tracker::builder()
///     .application_id("storefront")
///     .endpoint("https://collector.example.com/events")
///     .build()?;
///
/// let event = tracker.track_event(TrackerEvent::new("press-event")).await?;
/// println!("tracked {}", event.id());
///
/// // Drain pending events before exit
/// tracker.shutdown().await?;
/// ```
pub struct Tracker {
	application_id: String,
	tracker_id: String,
	transport: Arc<dyn Transport>,
	queue: Option<Arc<EventQueue>>,
	plugins: PluginRegistry,
	location_stack: Vec<LocationContext>,
	global_contexts: Vec<GlobalContext>,
	diagnostics: Arc<dyn DiagnosticsSink>,
	active: AtomicBool,
	closed: AtomicBool,
	flush_timeout: Duration,
	shutdown_notify: Arc<Notify>,
	runner: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
	/// Creates a new builder for constructing a Tracker.
	pub fn builder() -> TrackerBuilder {
		TrackerBuilder::new()
	}

	/// Tracks an event through the full pipeline and returns the enriched
	/// event.
	///
	/// The event is stamped with the tracking time, merged with the
	/// tracker's ambient contexts, enriched and validated by the plugins,
	/// then queued (or handed directly to the transport when no queue is
	/// configured). Delivery failures on the direct path are reported
	/// through diagnostics rather than returned; an inactive tracker
	/// returns the event untouched.
	pub async fn track_event(&self, mut event: TrackerEvent) -> Result<TrackerEvent> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(TrackerError::Shutdown);
		}
		if !self.active.load(Ordering::SeqCst) {
			return Ok(event);
		}

		self.merge_ambient_contexts(&mut event);
		event.set_time(Utc::now().timestamp_millis());

		self.plugins.enrich(&mut event);
		self.plugins.validate(&event);

		if self.transport.is_usable() {
			self.plugins.before_transport(&mut event);
			match &self.queue {
				Some(queue) => queue.push(vec![event.clone()]).await?,
				None => {
					if let Err(delivery_error) = self.transport.handle(std::slice::from_ref(&event)).await
					{
						self
							.diagnostics
							.error(&format!("delivery failed: {delivery_error}"));
						error!(
							error = %delivery_error,
							event_type = event.event_type(),
							"failed to deliver event"
						);
					}
				}
			}
		} else {
			self.diagnostics.log(&format!(
				"{} is not usable; {} not delivered",
				self.transport.transport_name(),
				event.event_type()
			));
			warn!(
				transport = self.transport.transport_name(),
				event_type = event.event_type(),
				"transport not usable; event not delivered"
			);
		}

		Ok(event)
	}

	fn merge_ambient_contexts(&self, event: &mut TrackerEvent) {
		if !self.location_stack.is_empty() {
			let own = mem::take(&mut event.location_stack);
			event.location_stack = self.location_stack.iter().cloned().chain(own).collect();
		}
		if !self.global_contexts.is_empty() {
			let own = mem::take(&mut event.global_contexts);
			event.global_contexts = self.global_contexts.iter().cloned().chain(own).collect();
		}
	}

	/// Drains the configured queue to empty; a no-op without a queue.
	pub async fn flush(&self) -> Result<()> {
		match &self.queue {
			Some(queue) => queue.flush().await,
			None => Ok(()),
		}
	}

	/// Drains the configured queue, giving up after `limit`.
	pub async fn flush_within(&self, limit: Duration) -> Result<()> {
		match &self.queue {
			Some(queue) => queue.flush_within(limit).await,
			None => Ok(()),
		}
	}

	/// Shuts down the tracker: stops the runner task and drains the queue
	/// within the configured flush timeout.
	///
	/// Idempotent; after the first call `track_event` fails with
	/// [`TrackerError::Shutdown`].
	pub async fn shutdown(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		self.shutdown_notify.notify_one();
		let runner = {
			let mut slot = self
				.runner
				.lock()
				.unwrap_or_else(|poisoned| poisoned.into_inner());
			slot.take()
		};
		if let Some(handle) = runner {
			if let Err(join_error) = handle.await {
				warn!(error = %join_error, "queue runner ended abnormally");
			}
		}

		if let Some(queue) = &self.queue {
			queue.flush_within(self.flush_timeout).await?;
		}

		info!(tracker_id = %self.tracker_id, "Tracker shut down");
		Ok(())
	}

	/// Mutes or unmutes event tracking at runtime.
	///
	/// While inactive, `track_event` returns events untouched.
	pub fn set_active(&self, active: bool) {
		self.active.store(active, Ordering::SeqCst);
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::SeqCst)
	}

	/// Returns true if the tracker has been shut down.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	pub fn application_id(&self) -> &str {
		&self.application_id
	}

	pub fn tracker_id(&self) -> &str {
		&self.tracker_id
	}

	pub fn transport(&self) -> &dyn Transport {
		self.transport.as_ref()
	}

	pub fn queue(&self) -> Option<&EventQueue> {
		self.queue.as_deref()
	}

	/// Read access to the plugin registry.
	pub fn plugins(&self) -> &PluginRegistry {
		&self.plugins
	}

	/// Exclusive access to the plugin registry, for configuration changes.
	pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
		&mut self.plugins
	}
}

impl Drop for Tracker {
	fn drop(&mut self) {
		let mut slot = self
			.runner
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		if let Some(handle) = slot.take() {
			handle.abort();
		}
	}
}
