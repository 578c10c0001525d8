//! The task wrapper: encapsulates one logical unit of work, its completion
//! sink, and its retry budget.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancellation::CombinedCancellation;
use crate::error::TaskError;
use crate::outcome::OneShotSink;
use crate::scope::RequestScope;
use crate::work::Work;

/// A monotonically increasing sequence number assigned at enqueue time.
///
/// Used as the FIFO tie-breaker within a priority bucket instead of a wall
/// clock reading, which can tie under high enqueue rates on platforms with
/// coarse clock resolution.
pub type Sequence = u64;

/// The unified task wrapper.
///
/// Owns the user work, its inner (user-driven) cancellation token, its
/// completion sink, and a remaining-attempts counter. `execute` runs the
/// work exactly once and reports whether the caller should re-enqueue it.
pub struct TaskWrapper<Arg, T, E> {
	id: Uuid,
	sequence: Sequence,
	work: Arc<dyn Work<Arg, T, E>>,
	inner_cancel: CancellationToken,
	attempts_remaining: u32,
	sink: Option<OneShotSink<T, E>>,
}

impl<Arg, T, E> TaskWrapper<Arg, T, E>
where
	Arg: Send + 'static,
	T: Send,
	E: Send,
{
	/// Creates a new wrapper around `work`, ready to be enqueued.
	///
	/// `attempts` is the total number of execution attempts permitted,
	/// combined by the caller (min with any manager-wide cap) before
	/// construction. Returns the wrapper and the receiver half of its
	/// completion sink.
	pub fn new(
		sequence: Sequence,
		work: Arc<dyn Work<Arg, T, E>>,
		inner_cancel: CancellationToken,
		attempts: u32,
	) -> (Self, tokio::sync::oneshot::Receiver<Result<T, TaskError<E>>>) {
		let (sink, rx) = OneShotSink::new();
		let wrapper = Self {
			id: Uuid::new_v4(),
			sequence,
			work,
			inner_cancel,
			attempts_remaining: attempts.max(1),
			sink: Some(sink),
		};
		(wrapper, rx)
	}

	/// Stable identifier for logging/tracing correlation.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// FIFO tie-breaker within a priority bucket.
	pub fn sequence(&self) -> Sequence {
		self.sequence
	}

	/// Attempts left before the next failure rejects the task permanently.
	pub fn attempts_remaining(&self) -> u32 {
		self.attempts_remaining
	}

	/// Runs the work once against `arg` under `scope`.
	///
	/// `scope` is valid for this call only; the caller derives it fresh per
	/// attempt rather than reusing one across retries. Returns `true` if
	/// the caller (the task manager) should re-enqueue this wrapper for
	/// another attempt; `false` if the wrapper has reached a terminal
	/// outcome and its completion sink has been signaled.
	pub async fn execute(&mut self, arg: &mut Arg, scope: RequestScope, outer: CancellationToken) -> bool {
		if self.inner_cancel.is_cancelled() {
			self.reject_cancelled();
			return false;
		}

		let combined = CombinedCancellation::new(self.inner_cancel.clone(), outer.clone());
		let linked = combined.link();

		tokio::select! {
			biased;
			() = self.inner_cancel.cancelled() => {
				self.reject_cancelled();
				false
			}
			() = outer.cancelled() => {
				tracing::error!(task_id = %self.id, "host cancellation mid-execution; preserving task for retry");
				true
			}
			result = self.work.call(arg, scope, (*linked).clone()) => {
				self.handle_result(result)
			}
		}
	}

	fn handle_result(&mut self, result: Result<T, E>) -> bool {
		match result {
			Ok(value) => {
				if let Some(sink) = self.sink.as_mut() {
					sink.resolve(value);
				}
				false
			}
			Err(err) => {
				self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
				if self.attempts_remaining > 0 {
					tracing::warn!(
						task_id = %self.id,
						attempts_remaining = self.attempts_remaining,
						"task execution failed; will retry"
					);
					true
				} else {
					tracing::error!(task_id = %self.id, "task execution failed; retry budget exhausted");
					if let Some(sink) = self.sink.as_mut() {
						sink.reject(TaskError::Failed(err));
					}
					false
				}
			}
		}
	}

	fn reject_cancelled(&mut self) {
		tracing::debug!(task_id = %self.id, "task cancelled by inner token");
		if let Some(sink) = self.sink.as_mut() {
			sink.reject(TaskError::Cancelled);
		}
	}

	/// Rejects the completion sink as panicked. Called by the worker when it
	/// catches a panic unwinding out of [`Self::execute`], since the panic
	/// itself skips the normal `handle_result` path.
	pub fn reject_panicked(&mut self) {
		tracing::error!(task_id = %self.id, "task execution panicked");
		if let Some(sink) = self.sink.as_mut() {
			sink.reject(TaskError::Panicked);
		}
	}
}
