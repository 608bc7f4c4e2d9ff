// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Direct HTTP delivery to a collector endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use loom_tracker_core::{CollectorPayload, TrackerEvent};

use crate::error::{Result, TrackerError};
use crate::transport::Transport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts event batches to a collector as JSON.
///
/// The collector contract is a single POST carrying
/// `{ events: [...], transport_time: <epoch millis> }`; any 2xx response is
/// success and everything else is a retryable delivery failure.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	endpoint: String,
	client: reqwest::Client,
}

impl HttpTransport {
	/// Create a transport posting to the given collector endpoint.
	pub fn new(endpoint: impl Into<String>) -> Result<Self> {
		let endpoint = endpoint.into();
		if endpoint.is_empty() {
			return Err(TrackerError::InvalidEndpoint(
				"endpoint must not be empty".to_string(),
			));
		}
		if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
			return Err(TrackerError::InvalidEndpoint(format!(
				"endpoint must be an http(s) URL, got '{endpoint}'"
			)));
		}

		let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

		Ok(Self { endpoint, client })
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl Transport for HttpTransport {
	fn transport_name(&self) -> &'static str {
		"HttpTransport"
	}

	async fn handle(&self, events: &[TrackerEvent]) -> Result<()> {
		if events.is_empty() {
			return Ok(());
		}

		let payload = CollectorPayload::new(events);
		let response = self
			.client
			.post(&self.endpoint)
			.json(&payload)
			.send()
			.await?;

		let status = response.status();
		if status.is_success() {
			debug!(
				count = events.len(),
				endpoint = %self.endpoint,
				"batch delivered"
			);
			return Ok(());
		}

		let message = response
			.text()
			.await
			.unwrap_or_else(|_| "Unknown error".to_string());
		Err(TrackerError::ServerError {
			status: status.as_u16(),
			message,
		})
	}
}
