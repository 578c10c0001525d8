//! Errors reported synchronously at the manager's enqueue boundary.

use thiserror::Error;

/// Validation failures for [`crate::TaskManager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
	/// `priority` fell outside `[0, max_priority]`.
	#[error("priority {priority} exceeds max_priority {max_priority}")]
	PriorityOutOfRange {
		/// The rejected priority.
		priority: u32,
		/// The manager's configured ceiling.
		max_priority: u32,
	},
}

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, ManagerError>;
