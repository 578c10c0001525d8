//! Completion sinks for task wrappers.
//!
//! One-shot tasks resolve exactly once through [`OneShotSink`]. Recurring
//! scheduled work (see the `taskline-scheduler` crate) emits per execution
//! through a `tokio::sync::broadcast` channel of [`Outcome`] and closes the
//! channel on cancellation or budget exhaustion.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{TaskError, TaskResult};

/// Outcome of one execution of a recurring task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
	/// The execution succeeded.
	Success(T),
	/// The execution failed (retry budget for this tick was exhausted).
	Failed(Arc<E>),
}

/// Single-use completion sink for a one-shot task.
///
/// Signals its receiver exactly once: via [`OneShotSink::resolve`] or
/// [`OneShotSink::reject`]. Dropping the sink without calling either rejects
/// the receiver with a closed-channel error, which callers treat the same
/// as cancellation.
#[derive(Debug)]
pub struct OneShotSink<T, E> {
	tx: Option<oneshot::Sender<TaskResult<T, E>>>,
}

impl<T, E> OneShotSink<T, E> {
	/// Creates a linked sink/receiver pair.
	pub fn new() -> (Self, oneshot::Receiver<TaskResult<T, E>>) {
		let (tx, rx) = oneshot::channel();
		(Self { tx: Some(tx) }, rx)
	}

	/// Resolves the receiver with a successful value.
	///
	/// No-op if already resolved or rejected.
	pub fn resolve(&mut self, value: T) {
		if let Some(tx) = self.tx.take() {
			let _ = tx.send(Ok(value));
		}
	}

	/// Rejects the receiver with a task error.
	///
	/// No-op if already resolved or rejected.
	pub fn reject(&mut self, err: TaskError<E>) {
		if let Some(tx) = self.tx.take() {
			let _ = tx.send(Err(err));
		}
	}

	/// True once [`Self::resolve`] or [`Self::reject`] has been called.
	pub fn is_settled(&self) -> bool {
		self.tx.is_none()
	}
}
