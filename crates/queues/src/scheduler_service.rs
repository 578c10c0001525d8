//! Scheduler service (§6): `addScheduledWork`, `addCronWork`, and
//! `addRepeatedWork`, each backed by the calendar scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskline_core::{Outcome, TaskResult, Work};
use taskline_scheduler::{Clock, ScheduledTaskWrapper, SchedulerManager, SchedulerWorker};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerOptions;
use crate::error::Result;
use crate::registry::ServiceRegistry;

struct SchedulerMarker;

/// The calendar scheduler façade: one instance per host process.
pub struct SchedulerService<T, E> {
	manager: Arc<SchedulerManager<T, E>>,
	clock: Arc<dyn Clock>,
	options: SchedulerOptions,
	cancel: CancellationToken,
	worker: tokio::task::JoinHandle<()>,
}

impl<T, E> SchedulerService<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Builds the service over `clock` and spawns its worker loop
	/// immediately. Pass [`taskline_scheduler::SystemClock`] in production;
	/// tests inject a [`taskline_scheduler::ManualClock`] for deterministic
	/// cron/interval behavior.
	pub fn new(registry: &ServiceRegistry, clock: Arc<dyn Clock>, options: SchedulerOptions) -> Result<Self> {
		registry.register::<SchedulerMarker>()?;
		options.validate()?;

		let manager = Arc::new(SchedulerManager::new(Arc::clone(&clock)));
		let worker_loop = SchedulerWorker::new(Arc::clone(&manager), Arc::clone(&clock), options.horizon);

		let cancel = CancellationToken::new();
		let cancel_for_worker = cancel.clone();
		let worker = tokio::spawn(async move { worker_loop.run(cancel_for_worker).await });

		Ok(Self {
			manager,
			clock,
			options,
			cancel,
			worker,
		})
	}

	/// `addScheduledWork(W, time)`: fires once at `at`.
	pub fn add_scheduled_work(&self, work: Arc<dyn Work<(), T, E>>, at: DateTime<Utc>, inner_cancel: CancellationToken) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		let now = self.clock.now();
		let (wrapper, rx) = ScheduledTaskWrapper::once(work, at, inner_cancel, now)?;
		self.manager.add(wrapper);
		Ok(rx)
	}

	/// `addScheduledWork(W, delay)`: fires once after `delay` from now.
	pub fn add_delayed_work(&self, work: Arc<dyn Work<(), T, E>>, delay: Duration, inner_cancel: CancellationToken) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		let now = self.clock.now();
		let at = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
		self.add_scheduled_work(work, at, inner_cancel)
	}

	/// `addCronWork(W, expr, execCount)`: fires on each cron occurrence.
	/// `exec_count` overrides the service's default budget (`-1` = unbounded).
	pub fn add_cron_work(
		&self,
		work: Arc<dyn Work<(), T, E>>,
		expr: &str,
		exec_count: Option<i64>,
		inner_cancel: CancellationToken,
	) -> Result<broadcast::Receiver<Outcome<T, E>>> {
		let exec_count = exec_count.unwrap_or(self.options.exec_count);
		let (wrapper, rx) = ScheduledTaskWrapper::cron(work, expr, exec_count, inner_cancel)?;
		self.manager.add(wrapper);
		Ok(rx)
	}

	/// `addRepeatedWork(W, start, period, execCount)`: fires every `period`,
	/// catching up if `start` is already in the past.
	pub fn add_repeated_work(
		&self,
		work: Arc<dyn Work<(), T, E>>,
		start: DateTime<Utc>,
		period: Duration,
		exec_count: Option<i64>,
		inner_cancel: CancellationToken,
	) -> Result<broadcast::Receiver<Outcome<T, E>>> {
		let now = self.clock.now();
		let exec_count = exec_count.unwrap_or(self.options.exec_count);
		let (wrapper, rx) = ScheduledTaskWrapper::fixed_interval(work, start, period, exec_count, inner_cancel, now)?;
		self.manager.add(wrapper);
		Ok(rx)
	}

	/// Cancels the worker loop and waits for it to exit.
	pub async fn shutdown(self) {
		tracing::info!("scheduler service shutting down");
		self.cancel.cancel();
		let _ = self.worker.await;
	}
}
