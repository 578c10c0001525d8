//! The worker loop: the long-running driver behind every queue service,
//! never exiting except on host cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use taskline_core::RequestScope;
use taskline_manager::TaskManager;
use tokio_util::sync::CancellationToken;

use crate::capability::{Activatable, Throttled};
use crate::processor::Processor;

/// Drives a [`Processor`] against a [`TaskManager`] for the lifetime of a
/// queue service.
pub struct WorkerLoop<Arg: Activatable, T, E> {
	manager: Arc<TaskManager<Arg, T, E>>,
	processor: Processor<Arg, T, E>,
}

impl<Arg, T, E> WorkerLoop<Arg, T, E>
where
	Arg: Activatable + Throttled + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds a worker loop over `manager`, dispatching through `processor`.
	pub fn new(manager: Arc<TaskManager<Arg, T, E>>, processor: Processor<Arg, T, E>) -> Self {
		Self { manager, processor }
	}

	/// Runs until `cancel` fires. Each iteration waits for work, opens a
	/// fresh per-iteration [`RequestScope`], then drains the manager through
	/// the processor; a panic surfacing from the processor is logged and the
	/// loop continues rather than unwinding out of `run`.
	pub async fn run(&self, cancel: CancellationToken) {
		loop {
			tokio::select! {
				biased;
				() = cancel.cancelled() => return,
				() = self.manager.wait_for_task(&cancel) => {}
			}

			if cancel.is_cancelled() {
				return;
			}

			let scope = RequestScope::new();
			let outcome = AssertUnwindSafe(self.processor.process_pending(&self.manager, &scope, &cancel))
				.catch_unwind()
				.await;
			if let Err(panic) = outcome {
				tracing::error!(panic = ?panic.downcast_ref::<&str>(), "processor panicked; worker loop continuing");
			}
		}
	}
}
