//! The scheduler manager: a time-ordered collection of live scheduled
//! wrappers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::Clock;
use crate::wrapper::ScheduledTaskWrapper;

/// Time-ordered store of live scheduled wrappers.
///
/// Cancelled or budget-exhausted wrappers are swept out lazily whenever
/// [`Self::next_time`] or [`Self::upcoming`] is queried, rather than via a
/// dedicated background sweep.
pub struct SchedulerManager<T, E> {
	wrappers: Mutex<Vec<ScheduledTaskWrapper<T, E>>>,
	notify: Notify,
	clock: Arc<dyn Clock>,
}

impl<T, E> SchedulerManager<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds an empty manager driven by `clock`.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self {
			wrappers: Mutex::new(Vec::new()),
			notify: Notify::new(),
			clock,
		}
	}

	/// Admits a newly scheduled wrapper and signals any waiter.
	pub fn add(&self, wrapper: ScheduledTaskWrapper<T, E>) {
		self.wrappers.lock().unwrap().push(wrapper);
		self.notify.notify_waiters();
	}

	/// Blocks until [`Self::add`] or [`Self::revert`] admits a wrapper, or
	/// `cancel` fires. Does not itself recheck [`Self::next_time`] — the
	/// caller is expected to be racing this against a bounded sleep that
	/// rechecks on its own, so a missed wakeup here only costs staleness up
	/// to that bound rather than an indefinite block.
	pub async fn wait_for_change(&self, cancel: &CancellationToken) {
		tokio::select! {
			biased;
			() = cancel.cancelled() => {}
			() = self.notify.notified() => {}
		}
	}

	/// Blocks until the manager holds at least one live, schedulable
	/// wrapper, or `cancel` fires.
	///
	/// The notified future is constructed before [`Self::next_time`] is
	/// checked, per `Notify`'s documented usage: otherwise an `add`/`revert`
	/// landing in the gap between the check and the `notified()` call wakes
	/// no one, and this would block until some unrelated later notification
	/// arrived instead of returning as soon as work exists.
	pub async fn wait_for_new_task(&self, cancel: &CancellationToken) {
		loop {
			let notified = self.notify.notified();
			if self.next_time().is_some() {
				return;
			}
			tokio::select! {
				biased;
				() = cancel.cancelled() => return,
				() = notified => {}
			}
		}
	}

	fn sweep(&self, now: DateTime<Utc>) {
		self.wrappers.lock().unwrap().retain(|w| w.next_scheduled_time(now).is_some());
	}

	/// The minimum due time across all live wrappers, or `None` if the
	/// manager holds nothing schedulable.
	pub fn next_time(&self) -> Option<DateTime<Utc>> {
		let now = self.clock.now();
		self.sweep(now);
		self.wrappers.lock().unwrap().iter().filter_map(|w| w.next_scheduled_time(now)).min()
	}

	/// A non-mutating snapshot of wrapper ids due within `[now, now + horizon)`,
	/// grouped by exact due instant. Calling this twice without an
	/// intervening `add`/`take`/`revert` yields an identical map.
	pub fn upcoming(&self, horizon: Duration) -> BTreeMap<DateTime<Utc>, Vec<Uuid>> {
		let now = self.clock.now();
		self.sweep(now);
		let until = now + chrono::Duration::from_std(horizon).unwrap_or(chrono::Duration::zero());
		let mut out: BTreeMap<DateTime<Utc>, Vec<Uuid>> = BTreeMap::new();
		for wrapper in self.wrappers.lock().unwrap().iter() {
			if let Some(due) = wrapper.next_scheduled_time(now)
				&& due < until
			{
				out.entry(due).or_default().push(wrapper.id());
			}
		}
		out
	}

	/// Removes and returns the wrapper with the given id, if still present.
	pub fn take(&self, id: Uuid) -> Option<ScheduledTaskWrapper<T, E>> {
		let mut wrappers = self.wrappers.lock().unwrap();
		let idx = wrappers.iter().position(|w| w.id() == id)?;
		Some(wrappers.remove(idx))
	}

	/// Re-admits a wrapper after its execution, unless it is now cancelled
	/// or budget-exhausted, in which case it is simply dropped (closing its
	/// completion sink).
	pub fn revert(&self, wrapper: ScheduledTaskWrapper<T, E>) {
		let now = self.clock.now();
		if wrapper.next_scheduled_time(now).is_some() {
			self.wrappers.lock().unwrap().push(wrapper);
			self.notify.notify_waiters();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use chrono::DateTime;
	use taskline_core::work_fn;

	use super::*;
	use crate::clock::ManualClock;

	fn dt(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(secs, 0).unwrap()
	}

	#[tokio::test]
	async fn next_time_is_the_minimum_live_due_time() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: SchedulerManager<u32, String> = SchedulerManager::new(clock.clone());
		let work = Arc::new(work_fn(|_: &mut (), _scope, _c| async { Ok::<u32, String>(0) }));

		let (late, _rx1) = ScheduledTaskWrapper::once(Arc::clone(&work), dt(50), CancellationToken::new(), dt(0)).unwrap();
		let (early, _rx2) = ScheduledTaskWrapper::once(work, dt(10), CancellationToken::new(), dt(0)).unwrap();
		manager.add(late);
		manager.add(early);

		assert_eq!(manager.next_time(), Some(dt(10)));
	}

	#[tokio::test]
	async fn upcoming_is_idempotent_without_mutation() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: SchedulerManager<u32, String> = SchedulerManager::new(clock);
		let work = Arc::new(work_fn(|_: &mut (), _scope, _c| async { Ok::<u32, String>(0) }));
		let (wrapper, _rx) = ScheduledTaskWrapper::once(work, dt(5), CancellationToken::new(), dt(0)).unwrap();
		manager.add(wrapper);

		let first = manager.upcoming(Duration::from_secs(60));
		let second = manager.upcoming(Duration::from_secs(60));
		assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
		assert_eq!(first.values().map(Vec::len).sum::<usize>(), second.values().map(Vec::len).sum::<usize>());
	}

	#[tokio::test]
	async fn cancelled_wrapper_is_swept_and_not_reverted() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: SchedulerManager<u32, String> = SchedulerManager::new(clock);
		let work = Arc::new(work_fn(|_: &mut (), _scope, _c| async { Ok::<u32, String>(0) }));
		let inner = CancellationToken::new();
		let (wrapper, _rx) = ScheduledTaskWrapper::once(work, dt(5), inner.clone(), dt(0)).unwrap();
		let id = wrapper.id();
		manager.add(wrapper);

		inner.cancel();
		assert_eq!(manager.next_time(), None);
		assert!(manager.take(id).is_none(), "swept out once cancelled");
	}

	#[tokio::test]
	async fn revert_drops_wrapper_once_exhausted() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: SchedulerManager<u32, String> = SchedulerManager::new(clock);
		let work = Arc::new(work_fn(|_: &mut (), _scope, _c| async { Ok::<u32, String>(0) }));
		let (mut wrapper, _rx) = ScheduledTaskWrapper::once(work, dt(5), CancellationToken::new(), dt(0)).unwrap();
		let id = wrapper.id();
		wrapper.execute(taskline_core::RequestScope::new(), CancellationToken::new(), dt(5)).await;
		manager.revert(wrapper);
		assert!(manager.take(id).is_none(), "spent one-shot is dropped, not re-admitted");
	}
}
