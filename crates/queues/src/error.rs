//! Error surface for the queue services (§7): synchronous validation and
//! registration-conflict failures reported at the enqueue/registration
//! boundary. Runtime failures inside a worker never reach here — they are
//! contained and surfaced through the task's own completion channel.

use thiserror::Error;

/// Errors reported synchronously by the queue services.
#[derive(Debug, Error)]
pub enum QueueError {
	/// Forwarded from the task manager's enqueue boundary.
	#[error(transparent)]
	Manager(#[from] taskline_manager::ManagerError),

	/// Forwarded from a scheduled-wrapper construction boundary.
	#[error(transparent)]
	Scheduler(#[from] taskline_scheduler::SchedulerError),

	/// A caller passed `attempts = 0`, which can never execute.
	#[error("attempts count must be positive")]
	NonPositiveAttempts,

	/// A construction-time option failed validation.
	#[error("invalid option: {0}")]
	InvalidOption(String),

	/// A second service was registered for a kind that only permits one
	/// live instance (e.g. two access queues over the same resource type).
	#[error("a service of this kind is already registered")]
	DuplicateRegistration,
}

/// Result type for queue service operations.
pub type Result<T> = std::result::Result<T, QueueError>;
