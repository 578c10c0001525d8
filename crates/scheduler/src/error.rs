//! Validation errors reported synchronously at schedule time.

use thiserror::Error;

/// Errors reported at the point a scheduled wrapper is constructed.
#[derive(Debug, Error)]
pub enum SchedulerError {
	/// A one-shot schedule time was not strictly in the future.
	#[error("scheduled time must be in the future")]
	PastTime,
	/// A fixed-interval period was zero.
	#[error("period must be positive")]
	NonPositivePeriod,
	/// The cron expression failed to parse.
	#[error("invalid cron expression: {0}")]
	InvalidCron(String),
}

/// Result type for scheduler construction.
pub type Result<T> = std::result::Result<T, SchedulerError>;
