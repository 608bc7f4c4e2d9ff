// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker SDK.
//!
//! Three behavioral classes share one enum:
//! - configuration errors fail fast at the violating call and are never
//!   swallowed;
//! - delivery errors are classified retryable vs terminal via
//!   [`RetryableError`] and handled inside the delivery pipeline;
//! - storage/encoding errors surface from the queue store operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur in the tracker SDK.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Invalid application id provided to the builder.
	#[error("Invalid application id: {0}")]
	InvalidApplicationId(String),

	/// Invalid collector endpoint provided to the builder.
	#[error("Invalid collector endpoint: {0}")]
	InvalidEndpoint(String),

	/// Neither a collector endpoint nor a custom transport was configured.
	#[error("Tracker requires either a collector endpoint or a transport")]
	MissingTransport,

	/// Both a collector endpoint and a custom transport were configured.
	#[error("Provide either a collector endpoint or a custom transport, not both")]
	TransportConflict,

	/// A plugin with the same name is already registered.
	#[error("Plugin {name} already exists; use replace instead")]
	PluginAlreadyExists { name: String },

	/// No plugin with that name is registered.
	#[error("Plugin {name} not found")]
	PluginNotFound { name: String },

	/// Plugin index outside the registry bounds.
	#[error("Invalid plugin index: {index}")]
	InvalidPluginIndex { index: usize },

	/// The queue was run before a process function was bound.
	#[error("Queue process function has not been set")]
	ProcessFunctionNotSet,

	/// No candidate transport was usable at call time.
	#[error("No usable transport")]
	NoUsableTransport,

	/// Network-level request failure.
	#[error("Request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// The collector answered with a non-success status.
	#[error("Collector error {status}: {message}")]
	ServerError { status: u16, message: String },

	/// A bounded flush did not drain the queue in time.
	#[error("Flush did not complete within {0:?}")]
	FlushTimedOut(Duration),

	/// Queue store I/O failure.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Serialization failure.
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The tracker has been shut down.
	#[error("Tracker has been shut down")]
	Shutdown,
}

/// Classification of errors as retryable or terminal.
pub trait RetryableError {
	/// Whether the operation that produced this error is worth retrying.
	fn is_retryable(&self) -> bool;
}

impl RetryableError for TrackerError {
	fn is_retryable(&self) -> bool {
		// The collector wire contract treats every non-2xx response and any
		// network-level failure as retryable; everything else is terminal.
		matches!(
			self,
			TrackerError::RequestFailed(_) | TrackerError::ServerError { .. }
		)
	}
}
