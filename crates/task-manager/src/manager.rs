//! The task manager: a priority-ordered FIFO store of pending wrappers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use taskline_core::TaskWrapper;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{ManagerError, Result};

/// A wrapper handed out by [`TaskManager::get_task`], paired with the
/// bucket it was taken from so [`TaskManager::revert_task`] can restore its
/// position.
pub struct TaskHandle<Arg, T, E> {
	/// The popped wrapper.
	pub wrapper: TaskWrapper<Arg, T, E>,
	/// The priority bucket the wrapper was taken from.
	pub priority: u32,
}

/// The task manager.
///
/// Holds one FIFO queue per priority level `0..=max_priority`. Retrieval is
/// highest-priority-first; within a priority, strictly FIFO. Priority
/// starvation across levels is permitted by design — this is documented
/// behavior, not a bug: a constant stream of high-priority work can
/// indefinitely delay a lower priority bucket.
pub struct TaskManager<Arg, T, E> {
	buckets: Vec<Mutex<VecDeque<TaskWrapper<Arg, T, E>>>>,
	count: AtomicUsize,
	notify: Notify,
	max_priority: u32,
}

impl<Arg, T, E> TaskManager<Arg, T, E> {
	/// Creates a manager with priority buckets `0..=max_priority`.
	pub fn new(max_priority: u32) -> Self {
		let buckets = (0..=max_priority).map(|_| Mutex::new(VecDeque::new())).collect();
		Self {
			buckets,
			count: AtomicUsize::new(0),
			notify: Notify::new(),
			max_priority,
		}
	}

	/// The inclusive upper bound on priority this manager accepts.
	pub fn max_priority(&self) -> u32 {
		self.max_priority
	}

	/// True iff any bucket is non-empty.
	pub fn has_task(&self) -> bool {
		self.count.load(Ordering::Acquire) > 0
	}

	/// Total pending wrappers across all buckets.
	pub fn len(&self) -> usize {
		self.count.load(Ordering::Acquire)
	}

	/// True iff no wrappers are pending.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Appends `wrapper` to the tail of `priority`'s bucket and wakes any
	/// waiters.
	pub fn enqueue(&self, wrapper: TaskWrapper<Arg, T, E>, priority: u32) -> Result<()> {
		let bucket = self.buckets.get(priority as usize).ok_or(ManagerError::PriorityOutOfRange {
			priority,
			max_priority: self.max_priority,
		})?;
		bucket.lock().unwrap().push_back(wrapper);
		self.count.fetch_add(1, Ordering::AcqRel);
		self.notify.notify_waiters();
		Ok(())
	}

	/// Blocks until [`Self::has_task`] becomes true or `cancel` fires.
	///
	/// The notified future is constructed before the condition is checked,
	/// per `Notify`'s documented usage: otherwise an `enqueue` landing
	/// between the check and the `notified()` call wakes no one, and this
	/// would block until some later, unrelated notification arrived.
	pub async fn wait_for_task(&self, cancel: &CancellationToken) {
		loop {
			let notified = self.notify.notified();
			if self.has_task() {
				return;
			}
			tokio::select! {
				biased;
				() = cancel.cancelled() => return,
				() = notified => {}
			}
		}
	}

	/// Atomically pops the FIFO head of the highest non-empty bucket.
	///
	/// Returns `None` if every bucket is empty.
	pub fn get_task(&self) -> Option<TaskHandle<Arg, T, E>> {
		for (priority, bucket) in self.buckets.iter().enumerate().rev() {
			let mut queue = bucket.lock().unwrap();
			if let Some(wrapper) = queue.pop_front() {
				drop(queue);
				self.count.fetch_sub(1, Ordering::AcqRel);
				return Some(TaskHandle {
					wrapper,
					priority: priority as u32,
				});
			}
		}
		None
	}

	/// Re-admits a wrapper returned from a failed-with-attempts-remaining
	/// execution.
	///
	/// By the time [`TaskWrapper::execute`] reports `revertRequested`, its
	/// internal attempts counter has already been decremented (or, for a
	/// host-cancellation mid-execution, left untouched) — see
	/// `taskline-core`'s wrapper contract. This only re-checks the counter
	/// defensively before deciding whether to re-enqueue at the tail of the
	/// same bucket or drop the wrapper silently.
	pub fn revert_task(&self, handle: TaskHandle<Arg, T, E>) {
		let TaskHandle { wrapper, priority } = handle;
		if wrapper.attempts_remaining() == 0 {
			tracing::debug!(task_id = %wrapper.id(), "revert_task: attempts exhausted, dropping");
			return;
		}
		let bucket = &self.buckets[priority as usize];
		bucket.lock().unwrap().push_back(wrapper);
		self.count.fetch_add(1, Ordering::AcqRel);
		self.notify.notify_waiters();
	}
}
