//! Error types for the task wrapper contract.

use thiserror::Error;

/// Outcome of a failed or cancelled task, delivered through its completion
/// sink.
#[derive(Debug, Error)]
pub enum TaskError<E> {
	/// The user work function failed and the retry budget is exhausted.
	#[error("task failed: {0}")]
	Failed(E),
	/// The task was cancelled by its own (inner) cancellation token.
	#[error("task was cancelled")]
	Cancelled,
	/// The user work function panicked instead of returning.
	#[error("task panicked")]
	Panicked,
}

/// Result type for a task's completion channel.
pub type TaskResult<T, E> = std::result::Result<T, TaskError<E>>;
