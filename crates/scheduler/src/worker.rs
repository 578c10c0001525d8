//! The scheduler worker: sleeps until the earliest due time, then dispatches
//! everything due into a request-scoped executor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use taskline_core::RequestScope;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::manager::SchedulerManager;
use crate::wrapper::ScheduledTaskWrapper;

/// Small catch-up window used when snapshotting due wrappers, to absorb
/// scheduling jitter between `next_time()` and the sleep actually elapsing.
/// Distinct from `horizon`, which bounds how long a single sleep can run
/// before the worker wakes to recheck for newly added work.
const CATCH_UP_WINDOW: Duration = Duration::from_millis(50);

/// Drives a [`SchedulerManager`] for the lifetime of the scheduler service.
pub struct SchedulerWorker<T, E> {
	manager: Arc<SchedulerManager<T, E>>,
	clock: Arc<dyn Clock>,
	horizon: Duration,
}

impl<T, E> SchedulerWorker<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Builds a worker over `manager`, capping each sleep at `horizon`.
	pub fn new(manager: Arc<SchedulerManager<T, E>>, clock: Arc<dyn Clock>, horizon: Duration) -> Self {
		Self { manager, clock, horizon }
	}

	/// Runs until `cancel` fires. Never exits for any other reason: a panic
	/// surfacing from a dispatched wrapper is caught and logged per-task.
	pub async fn run(&self, cancel: CancellationToken) {
		loop {
			if cancel.is_cancelled() {
				return;
			}

			match self.manager.next_time() {
				None => {
					self.manager.wait_for_new_task(&cancel).await;
					continue;
				}
				Some(next) => {
					let now = self.clock.now();
					let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
					let capped = wait.min(self.horizon);
					tokio::select! {
						biased;
						() = cancel.cancelled() => return,
						() = self.manager.wait_for_change(&cancel) => continue,
						() = tokio::time::sleep(capped) => {}
					}
				}
			}

			if cancel.is_cancelled() {
				return;
			}

			self.dispatch_due(&cancel).await;
		}
	}

	async fn dispatch_due(&self, cancel: &CancellationToken) {
		let due = self.manager.upcoming(CATCH_UP_WINDOW);
		for (_due_at, ids) in due {
			let mut in_flight: JoinSet<()> = JoinSet::new();
			for id in ids {
				let Some(wrapper) = self.manager.take(id) else { continue };
				let manager = Arc::clone(&self.manager);
				let clock = Arc::clone(&self.clock);
				let cancel = cancel.clone();
				in_flight.spawn(Self::run_one(manager, clock, wrapper, cancel));
			}
			while let Some(result) = in_flight.join_next().await {
				if let Err(err) = result {
					tracing::error!(error = %err, "scheduled task dispatch panicked");
				}
			}
		}
	}

	async fn run_one(manager: Arc<SchedulerManager<T, E>>, clock: Arc<dyn Clock>, mut wrapper: ScheduledTaskWrapper<T, E>, cancel: CancellationToken) {
		let id = wrapper.id();
		let now = clock.now();
		let scope = RequestScope::new();
		let outcome = AssertUnwindSafe(wrapper.execute(scope, cancel, now)).catch_unwind().await;
		if outcome.is_err() {
			tracing::error!(task_id = %id, "scheduled task execution panicked");
		}
		manager.revert(wrapper);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use chrono::{DateTime, Utc};
	use taskline_core::{Outcome, work_fn};

	use super::*;
	use crate::clock::ManualClock;

	fn dt(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(secs, 0).unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn one_shot_fires_once_and_is_dropped() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: Arc<SchedulerManager<u32, String>> = Arc::new(SchedulerManager::new(Arc::clone(&clock) as Arc<dyn Clock>));
		let completions = Arc::new(AtomicU32::new(0));
		let completions_clone = Arc::clone(&completions);
		let work = Arc::new(work_fn(move |_: &mut (), _scope, _cancel| {
			let completions = Arc::clone(&completions_clone);
			async move {
				completions.fetch_add(1, Ordering::SeqCst);
				Ok::<u32, String>(0)
			}
		}));
		let (wrapper, rx) = ScheduledTaskWrapper::once(work, dt(1), CancellationToken::new(), dt(0)).unwrap();
		let id = wrapper.id();
		manager.add(wrapper);

		let worker = SchedulerWorker::new(Arc::clone(&manager), Arc::clone(&clock) as Arc<dyn Clock>, Duration::from_secs(10));
		let cancel = CancellationToken::new();
		let cancel_clone = cancel.clone();
		let clock_driver = Arc::clone(&clock);
		let handle = tokio::spawn(async move { worker.run(cancel_clone).await });

		// advance tokio's paused clock and the manual wall clock together
		clock_driver.advance(Duration::from_secs(2));
		tokio::time::advance(Duration::from_secs(2)).await;

		assert_eq!(rx.await.unwrap().unwrap(), 0);
		assert_eq!(completions.load(Ordering::SeqCst), 1);
		assert!(manager.take(id).is_none(), "one-shot is not re-admitted");

		cancel.cancel();
		tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn cron_schedule_emits_exec_count_times_then_closes() {
		let clock = Arc::new(ManualClock::new(dt(0)));
		let manager: Arc<SchedulerManager<u32, String>> = Arc::new(SchedulerManager::new(Arc::clone(&clock) as Arc<dyn Clock>));
		let work = Arc::new(work_fn(|_: &mut (), _scope, _cancel| async { Ok::<u32, String>(0) }));

		// every 5 seconds, budget of 3 executions
		let (wrapper, mut rx) = ScheduledTaskWrapper::cron(work, "*/5 * * * * *", 3, CancellationToken::new()).unwrap();
		let id = wrapper.id();
		manager.add(wrapper);

		let worker = SchedulerWorker::new(Arc::clone(&manager), Arc::clone(&clock) as Arc<dyn Clock>, Duration::from_secs(10));
		let cancel = CancellationToken::new();
		let cancel_clone = cancel.clone();
		let handle = tokio::spawn(async move { worker.run(cancel_clone).await });

		for _ in 0..3 {
			clock.advance(Duration::from_secs(5));
			tokio::time::advance(Duration::from_secs(5)).await;
			assert_eq!(rx.recv().await.unwrap(), Outcome::Success(0));
		}

		// budget exhausted: the wrapper is gone and nextScheduledTime is null
		assert!(manager.take(id).is_none());
		assert_eq!(manager.next_time(), None);
		assert!(matches!(rx.recv().await, Err(tokio::sync::broadcast::error::RecvError::Closed)));

		cancel.cancel();
		tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn repeated_start_in_past_catches_up_then_fires_twice_at_one_second_spacing() {
		let clock = Arc::new(ManualClock::new(dt(100)));
		let manager: Arc<SchedulerManager<u32, String>> = Arc::new(SchedulerManager::new(Arc::clone(&clock) as Arc<dyn Clock>));
		let work = Arc::new(work_fn(|_: &mut (), _scope, _cancel| async { Ok::<u32, String>(0) }));

		// startTime = now - 10*period, period = 1s, execCount = 2
		let start = dt(100) - chrono::Duration::seconds(10);
		let (wrapper, mut rx) = ScheduledTaskWrapper::fixed_interval(work, start, Duration::from_secs(1), 2, CancellationToken::new(), dt(100)).unwrap();

		// first nextScheduledTime lies in [now, now + period)
		let first_due = wrapper.next_scheduled_time(dt(100)).unwrap();
		assert!(first_due >= dt(100) && first_due < dt(101));

		let id = wrapper.id();
		manager.add(wrapper);

		let worker = SchedulerWorker::new(Arc::clone(&manager), Arc::clone(&clock) as Arc<dyn Clock>, Duration::from_secs(10));
		let cancel = CancellationToken::new();
		let cancel_clone = cancel.clone();
		let handle = tokio::spawn(async move { worker.run(cancel_clone).await });

		clock.advance(Duration::from_secs(1));
		tokio::time::advance(Duration::from_secs(1)).await;
		assert_eq!(rx.recv().await.unwrap(), Outcome::Success(0));

		clock.advance(Duration::from_secs(1));
		tokio::time::advance(Duration::from_secs(1)).await;
		assert_eq!(rx.recv().await.unwrap(), Outcome::Success(0));

		assert!(manager.take(id).is_none(), "exhausted after exactly two executions");

		cancel.cancel();
		tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
	}
}
