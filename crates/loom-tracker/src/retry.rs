// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retrying delivery wrapper with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use loom_tracker_core::TrackerEvent;

use crate::error::{Result, RetryableError};
use crate::transport::Transport;

/// Backoff parameters for [`RetryTransport`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total number of delivery attempts, the first one included.
	pub max_attempts: u32,
	/// Base delay before the first retry.
	pub min_timeout: Duration,
	/// Per-attempt delay cap; `None` leaves the backoff uncapped.
	pub max_timeout: Option<Duration>,
	/// Overall deadline across attempts; `None` retries until `max_attempts`.
	pub max_retry: Option<Duration>,
	/// Exponential base applied per failed attempt.
	pub retry_factor: f64,
	/// Multiply each delay by a random factor in [0.5, 1.5).
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 10,
			min_timeout: Duration::from_secs(1),
			max_timeout: None,
			max_retry: None,
			retry_factor: 2.0,
			jitter: true,
		}
	}
}

/// One entry in the per-call attempts history.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
	/// 1-based attempt number.
	pub attempt: u32,
	/// Error produced by this attempt, if it failed.
	pub error: Option<String>,
	/// Delay slept before the next attempt, if one followed.
	pub delay: Option<Duration>,
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
	let exponential_delay =
		config.min_timeout.as_secs_f64() * config.retry_factor.powi(attempt as i32);
	let capped_delay = match config.max_timeout {
		Some(max) => exponential_delay.min(max.as_secs_f64()),
		None => exponential_delay,
	};

	let final_delay = if config.jitter {
		let jitter_factor = 0.5 + fastrand::f64();
		capped_delay * jitter_factor
	} else {
		capped_delay
	};

	Duration::from_secs_f64(final_delay)
}

/// Wraps an inner transport in a bounded exponential-backoff retry loop.
///
/// Only errors classified retryable by [`RetryableError`] are retried; the
/// loop stops at `max_attempts`, at the first terminal error, or once the
/// `max_retry` deadline would be overshot, and returns the last attempt's
/// error. The inter-attempt suspension is local to the call.
pub struct RetryTransport {
	inner: Arc<dyn Transport>,
	config: RetryConfig,
	attempts: tokio::sync::Mutex<Vec<RetryAttempt>>,
}

impl RetryTransport {
	pub fn new(inner: Arc<dyn Transport>) -> Self {
		Self::with_config(inner, RetryConfig::default())
	}

	pub fn with_config(inner: Arc<dyn Transport>, config: RetryConfig) -> Self {
		Self {
			inner,
			config,
			attempts: tokio::sync::Mutex::new(Vec::new()),
		}
	}

	pub fn config(&self) -> &RetryConfig {
		&self.config
	}

	/// Attempts history of the most recent `handle` call.
	pub async fn attempts(&self) -> Vec<RetryAttempt> {
		self.attempts.lock().await.clone()
	}

	async fn record(&self, attempt: RetryAttempt) {
		self.attempts.lock().await.push(attempt);
	}
}

#[async_trait]
impl Transport for RetryTransport {
	fn transport_name(&self) -> &'static str {
		"RetryTransport"
	}

	fn is_usable(&self) -> bool {
		self.inner.is_usable()
	}

	async fn handle(&self, events: &[TrackerEvent]) -> Result<()> {
		self.attempts.lock().await.clear();
		let started = Instant::now();
		let mut attempt: u32 = 0;

		loop {
			match self.inner.handle(events).await {
				Ok(()) => {
					self
						.record(RetryAttempt {
							attempt: attempt + 1,
							error: None,
							delay: None,
						})
						.await;
					return Ok(());
				}
				Err(error) => {
					let failed = RetryAttempt {
						attempt: attempt + 1,
						error: Some(error.to_string()),
						delay: None,
					};

					if !error.is_retryable() {
						self.record(failed).await;
						warn!(%error, attempt = attempt + 1, "terminal delivery error");
						return Err(error);
					}

					if attempt + 1 >= self.config.max_attempts {
						self.record(failed).await;
						warn!(
							%error,
							attempts = attempt + 1,
							"delivery attempts exhausted"
						);
						return Err(error);
					}

					let delay = calculate_delay(&self.config, attempt);
					if let Some(max_retry) = self.config.max_retry {
						if started.elapsed() + delay > max_retry {
							self.record(failed).await;
							warn!(
								%error,
								elapsed_ms = started.elapsed().as_millis(),
								"delivery deadline exceeded"
							);
							return Err(error);
						}
					}

					self
						.record(RetryAttempt {
							delay: Some(delay),
							..failed
						})
						.await;
					warn!(
						%error,
						attempt = attempt + 1,
						max_attempts = self.config.max_attempts,
						delay_ms = delay.as_millis(),
						"retrying delivery"
					);
					tokio::time::sleep(delay).await;
					attempt += 1;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TrackerError;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug)]
	struct FlakyTransport {
		calls: AtomicUsize,
		fail_first: usize,
		terminal: bool,
		usable: bool,
	}

	impl FlakyTransport {
		fn new(fail_first: usize) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				fail_first,
				terminal: false,
				usable: true,
			})
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl Transport for FlakyTransport {
		fn transport_name(&self) -> &'static str {
			"FlakyTransport"
		}

		fn is_usable(&self) -> bool {
			self.usable
		}

		async fn handle(&self, _events: &[TrackerEvent]) -> Result<()> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			if call <= self.fail_first {
				if self.terminal {
					return Err(TrackerError::NoUsableTransport);
				}
				return Err(TrackerError::ServerError {
					status: 503,
					message: "try again".to_string(),
				});
			}
			Ok(())
		}
	}

	fn fast(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			min_timeout: Duration::from_millis(1),
			jitter: false,
			..RetryConfig::default()
		}
	}

	#[tokio::test]
	async fn test_succeeds_after_transient_failures() {
		let inner = FlakyTransport::new(2);
		let retry = RetryTransport::with_config(inner.clone(), fast(3));

		retry.handle(&[TrackerEvent::new("press-event")]).await.unwrap();

		assert_eq!(inner.calls(), 3);
		let attempts = retry.attempts().await;
		assert_eq!(attempts.len(), 3);
		assert!(attempts[0].error.is_some());
		assert!(attempts[0].delay.is_some());
		assert!(attempts[2].error.is_none());
		assert!(attempts[2].delay.is_none());
	}

	#[tokio::test]
	async fn test_gives_up_after_max_attempts() {
		let inner = FlakyTransport::new(usize::MAX);
		let retry = RetryTransport::with_config(inner.clone(), fast(3));

		let error = retry
			.handle(&[TrackerEvent::new("press-event")])
			.await
			.unwrap_err();

		assert!(matches!(error, TrackerError::ServerError { status: 503, .. }));
		assert_eq!(inner.calls(), 3);
		let attempts = retry.attempts().await;
		assert_eq!(attempts.len(), 3);
		assert!(attempts[2].error.is_some());
		assert!(attempts[2].delay.is_none());
	}

	#[tokio::test]
	async fn test_terminal_errors_are_not_retried() {
		let inner = Arc::new(FlakyTransport {
			calls: AtomicUsize::new(0),
			fail_first: usize::MAX,
			terminal: true,
			usable: true,
		});
		let retry = RetryTransport::with_config(inner.clone(), fast(5));

		let error = retry
			.handle(&[TrackerEvent::new("press-event")])
			.await
			.unwrap_err();

		assert!(matches!(error, TrackerError::NoUsableTransport));
		assert_eq!(inner.calls(), 1);
	}

	#[tokio::test]
	async fn test_overall_deadline_stops_retrying() {
		let inner = FlakyTransport::new(usize::MAX);
		let config = RetryConfig {
			max_attempts: 10,
			min_timeout: Duration::from_secs(3600),
			jitter: false,
			max_retry: Some(Duration::ZERO),
			..RetryConfig::default()
		};
		let retry = RetryTransport::with_config(inner.clone(), config);

		let error = retry
			.handle(&[TrackerEvent::new("press-event")])
			.await
			.unwrap_err();

		assert!(matches!(error, TrackerError::ServerError { .. }));
		assert_eq!(inner.calls(), 1);
	}

	#[tokio::test]
	async fn test_usability_delegates_to_the_inner_transport() {
		let inner = Arc::new(FlakyTransport {
			calls: AtomicUsize::new(0),
			fail_first: 0,
			terminal: false,
			usable: false,
		});
		let retry = RetryTransport::new(inner);
		assert!(!retry.is_usable());
	}

	#[test]
	fn test_backoff_grows_by_the_retry_factor() {
		let config = RetryConfig {
			min_timeout: Duration::from_millis(100),
			retry_factor: 2.0,
			jitter: false,
			..RetryConfig::default()
		};

		assert_eq!(calculate_delay(&config, 0), Duration::from_millis(100));
		assert_eq!(calculate_delay(&config, 1), Duration::from_millis(200));
		assert_eq!(calculate_delay(&config, 2), Duration::from_millis(400));
	}

	#[test]
	fn test_max_timeout_caps_the_delay() {
		let config = RetryConfig {
			min_timeout: Duration::from_millis(100),
			max_timeout: Some(Duration::from_millis(250)),
			retry_factor: 2.0,
			jitter: false,
			..RetryConfig::default()
		};

		assert_eq!(calculate_delay(&config, 1), Duration::from_millis(200));
		assert_eq!(calculate_delay(&config, 2), Duration::from_millis(250));
		assert_eq!(calculate_delay(&config, 5), Duration::from_millis(250));
	}

	#[test]
	fn test_jitter_stays_within_bounds() {
		let config = RetryConfig {
			min_timeout: Duration::from_millis(100),
			jitter: true,
			..RetryConfig::default()
		};

		for _ in 0..50 {
			let delay = calculate_delay(&config, 0);
			assert!(delay >= Duration::from_millis(50), "delay {delay:?} below jitter floor");
			assert!(delay < Duration::from_millis(150), "delay {delay:?} above jitter ceiling");
		}
	}
}
