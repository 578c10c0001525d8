//! The task processor: drives concurrent dispatch of pending tasks against
//! an argument pool.

use std::sync::Arc;

use futures::FutureExt;
use taskline_core::RequestScope;
use taskline_manager::{TaskHandle, TaskManager};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::capability::{Activatable, Throttled};
use crate::pool::{ArgumentPool, PoolSlot};

/// Orchestrates execution of tasks popped from a [`TaskManager`] against an
/// [`ArgumentPool`], honoring activation and throttling capabilities and
/// capping in-flight concurrency at the pool's size.
pub struct Processor<Arg: Activatable, T, E> {
	pool: Arc<ArgumentPool<Arg>>,
	_marker: std::marker::PhantomData<(T, E)>,
}

impl<Arg, T, E> Processor<Arg, T, E>
where
	Arg: Activatable + Throttled + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds a processor around `pool`, shared with the caller so it can be
	/// deactivated and disposed at shutdown.
	pub fn new(pool: Arc<ArgumentPool<Arg>>) -> Self {
		Self {
			pool,
			_marker: std::marker::PhantomData,
		}
	}

	/// Runs until the manager has no pending work or `cancel` fires.
	///
	/// Each dispatched task runs to completion inside this call — tasks are
	/// launched concurrently up to the pool's cap, but `process_pending`
	/// does not return while any of its own dispatches are still in flight.
	/// `scope` is the worker loop's per-iteration scope; each dispatched
	/// task runs under a [`RequestScope::child`] derived from it. On
	/// return, any pooled arguments left idle are deactivated in place.
	pub async fn process_pending(&self, manager: &Arc<TaskManager<Arg, T, E>>, scope: &RequestScope, cancel: &CancellationToken) {
		let mut in_flight: JoinSet<()> = JoinSet::new();

		while manager.has_task() && !cancel.is_cancelled() {
			let mut slot = match self.pool.acquire(cancel).await {
				None => break,
				Some(Ok(slot)) => slot,
				Some(Err(err)) => {
					tracing::error!(error = ?err, "argument factory failed; skipping this pop");
					continue;
				}
			};

			let Some(handle) = manager.get_task() else {
				// Lost the race between HasTask and get_task; give the slot back.
				self.pool.release(slot);
				continue;
			};

			if !slot.get_mut().is_active()
				&& let Err(err) = slot.get_mut().activate().await
			{
				tracing::error!(task_id = %handle.wrapper.id(), error = ?err, "argument activation failed; reverting task");
				manager.revert_task(handle);
				self.pool.discard(slot);
				continue;
			}

			let pool = Arc::clone(&self.pool);
			let manager = Arc::clone(manager);
			let task_scope = scope.child();
			let cancel_for_task = cancel.clone();

			in_flight.spawn(Self::run_one(pool, manager, handle, slot, task_scope, cancel_for_task));
		}

		while let Some(result) = in_flight.join_next().await {
			if let Err(err) = result {
				tracing::error!(error = %err, "task dispatch panicked");
			}
		}

		self.pool.deactivate_idle().await;
	}

	async fn run_one(
		pool: Arc<ArgumentPool<Arg>>,
		manager: Arc<TaskManager<Arg, T, E>>,
		mut handle: TaskHandle<Arg, T, E>,
		mut slot: PoolSlot<Arg>,
		scope: RequestScope,
		cancel: CancellationToken,
	) {
		let span = tracing::info_span!("task.execute", task.id = %handle.wrapper.id(), task.priority = handle.priority);
		let child_cancel = cancel.child_token();
		let executed = std::panic::AssertUnwindSafe(handle.wrapper.execute(slot.get_mut(), scope, child_cancel))
			.catch_unwind()
			.instrument(span)
			.await;

		let revert_requested = match executed {
			Ok(revert_requested) => revert_requested,
			Err(_panic) => {
				handle.wrapper.reject_panicked();
				false
			}
		};

		if let Some(delay) = slot.get_mut().throttle_delay()
			&& manager.has_task()
		{
			tokio::select! {
				biased;
				() = cancel.cancelled() => {}
				() = tokio::time::sleep(delay) => {}
			}
		}

		if revert_requested {
			manager.revert_task(handle);
		}
		pool.release(slot);
	}
}
