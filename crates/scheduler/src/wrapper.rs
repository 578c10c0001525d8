//! The scheduled-task wrapper: as the plain task wrapper, but carries a
//! recurrence policy and an execution budget instead of a plain retry count.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskline_core::{CombinedCancellation, OneShotSink, Outcome, RequestScope, TaskError, Work};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::recurrence::Recurrence;

/// Execution budget for a scheduled wrapper: unlimited, or a countdown.
#[derive(Debug, Clone, Copy)]
enum Budget {
	Unlimited,
	Remaining(u32),
}

impl Budget {
	fn from_exec_count(exec_count: i64) -> Self {
		if exec_count < 0 {
			Self::Unlimited
		} else {
			Self::Remaining(exec_count as u32)
		}
	}

	fn is_exhausted(self) -> bool {
		matches!(self, Self::Remaining(0))
	}

	fn decrement(&mut self) {
		if let Self::Remaining(n) = self {
			*n = n.saturating_sub(1);
		}
	}
}

enum Sink<T, E> {
	Once(Option<OneShotSink<T, E>>),
	Recurring(broadcast::Sender<Outcome<T, E>>),
}

/// A unit of work plus a recurrence policy and execution budget.
pub struct ScheduledTaskWrapper<T, E> {
	id: Uuid,
	work: Arc<dyn Work<(), T, E>>,
	inner_cancel: CancellationToken,
	recurrence: Recurrence,
	budget: Budget,
	sink: Sink<T, E>,
}

impl<T, E> ScheduledTaskWrapper<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// A one-shot wrapper firing once at `at`.
	pub fn once(
		work: Arc<dyn Work<(), T, E>>,
		at: DateTime<Utc>,
		inner_cancel: CancellationToken,
		now: DateTime<Utc>,
	) -> Result<(Self, oneshot::Receiver<taskline_core::TaskResult<T, E>>)> {
		let recurrence = Recurrence::once(at, now)?;
		let (sink, rx) = OneShotSink::new();
		let wrapper = Self {
			id: Uuid::new_v4(),
			work,
			inner_cancel,
			recurrence,
			budget: Budget::Remaining(1),
			sink: Sink::Once(Some(sink)),
		};
		Ok((wrapper, rx))
	}

	/// A fixed-interval wrapper starting at `start`, ticking every `period`,
	/// with `exec_count` remaining executions (`-1` for unlimited).
	pub fn fixed_interval(
		work: Arc<dyn Work<(), T, E>>,
		start: DateTime<Utc>,
		period: Duration,
		exec_count: i64,
		inner_cancel: CancellationToken,
		now: DateTime<Utc>,
	) -> Result<(Self, broadcast::Receiver<Outcome<T, E>>)> {
		let recurrence = Recurrence::fixed_interval(start, period, now)?;
		Self::recurring(work, recurrence, exec_count, inner_cancel)
	}

	/// A cron-driven wrapper with `exec_count` remaining executions
	/// (`-1` for unlimited).
	pub fn cron(
		work: Arc<dyn Work<(), T, E>>,
		expr: &str,
		exec_count: i64,
		inner_cancel: CancellationToken,
	) -> Result<(Self, broadcast::Receiver<Outcome<T, E>>)> {
		let recurrence = Recurrence::cron(expr)?;
		Self::recurring(work, recurrence, exec_count, inner_cancel)
	}

	fn recurring(
		work: Arc<dyn Work<(), T, E>>,
		recurrence: Recurrence,
		exec_count: i64,
		inner_cancel: CancellationToken,
	) -> Result<(Self, broadcast::Receiver<Outcome<T, E>>)> {
		let (tx, rx) = broadcast::channel(1);
		let wrapper = Self {
			id: Uuid::new_v4(),
			work,
			inner_cancel,
			recurrence,
			budget: Budget::from_exec_count(exec_count),
			sink: Sink::Recurring(tx),
		};
		Ok((wrapper, rx))
	}

	/// Stable identifier for logging and lookup.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// The next due time, or `None` iff this wrapper is cancelled, its
	/// budget is exhausted, or (for a one-shot) it has already fired.
	pub fn next_scheduled_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
		if self.inner_cancel.is_cancelled() || self.budget.is_exhausted() {
			return None;
		}
		self.recurrence.next_time(now)
	}

	/// Runs the work once under `scope`, opened fresh by the caller for this
	/// attempt. Returns `true` if host (outer) cancellation fired
	/// mid-execution and the wrapper must be preserved untouched; `false`
	/// once a normal outcome (success, failure, or inner cancellation) has
	/// been recorded. Callers decide whether to re-admit the wrapper by
	/// checking [`Self::next_scheduled_time`] afterward, not by this return
	/// value alone — a completed recurring tick still has a future due time.
	pub async fn execute(&mut self, scope: RequestScope, outer: CancellationToken, now: DateTime<Utc>) -> bool {
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
				tracing::error!(task_id = %self.id, "host cancellation mid-execution; scheduled task preserved");
				true
			}
			result = self.work.call(&mut (), scope, (*linked).clone()) => {
				self.handle_result(result);
				false
			}
		}
	}

	fn handle_result(&mut self, result: std::result::Result<T, E>) {
		self.budget.decrement();
		self.recurrence.advance();
		match (&mut self.sink, result) {
			(Sink::Once(slot), Ok(value)) => {
				if let Some(sink) = slot.as_mut() {
					sink.resolve(value);
				}
			}
			(Sink::Once(slot), Err(err)) => {
				if let Some(sink) = slot.as_mut() {
					sink.reject(TaskError::Failed(err));
				}
			}
			(Sink::Recurring(tx), Ok(value)) => {
				let _ = tx.send(Outcome::Success(value));
			}
			(Sink::Recurring(tx), Err(err)) => {
				let _ = tx.send(Outcome::Failed(Arc::new(err)));
			}
		}
	}

	fn reject_cancelled(&mut self) {
		tracing::debug!(task_id = %self.id, "scheduled task cancelled by inner token");
		if let Sink::Once(slot) = &mut self.sink
			&& let Some(sink) = slot.as_mut()
		{
			sink.reject(TaskError::Cancelled);
		}
		// Recurring sinks have no explicit "cancelled" emission: dropping the
		// wrapper (the caller does this once next_scheduled_time is None)
		// drops the broadcast sender, which closes the channel.
	}
}
