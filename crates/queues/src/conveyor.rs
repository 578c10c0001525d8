//! Conveyor service (§6): a queue whose argument is a "machine" `M` that
//! transforms input data `D` into output `T`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use taskline_core::{TaskResult, TaskWrapper, work_fn};
use taskline_manager::TaskManager;
use taskline_worker::{Activatable, ArgumentPool, Processor, Throttled, WorkerLoop};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{ProcessorOptions, TaskManagerOptions};
use crate::error::{QueueError, Result};
use crate::registry::ServiceRegistry;

/// A transformation `D -> T` performed against a conveyor's machine `M`.
#[async_trait]
pub trait Transform<M, D, T, E>: Send + Sync {
	/// Runs the transformation once, observing `cancel` cooperatively.
	async fn transform(&self, machine: &mut M, input: D, cancel: CancellationToken) -> std::result::Result<T, E>;
}

struct ConveyorMarker<M, D, T>(PhantomData<(M, D, T)>);

/// `processData(D, attempts, cancellation) -> Promise<T>` and its priority
/// variant (§6).
pub struct ConveyorService<M, D, T, E> {
	manager: Arc<TaskManager<M, T, E>>,
	pool: Arc<ArgumentPool<M>>,
	transform: Arc<dyn Transform<M, D, T, E>>,
	options: TaskManagerOptions,
	sequence: AtomicU64,
	cancel: CancellationToken,
	worker: tokio::task::JoinHandle<()>,
}

impl<M, D, T, E> ConveyorService<M, D, T, E>
where
	M: Activatable + Throttled + Send + 'static,
	D: Clone + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds the service around `pool` (the machine's lifecycle) and
	/// `transform` (shared across every dispatched task).
	pub fn new(
		registry: &ServiceRegistry,
		manager_options: TaskManagerOptions,
		processor_options: ProcessorOptions,
		pool: ArgumentPool<M>,
		transform: Arc<dyn Transform<M, D, T, E>>,
	) -> Result<Self> {
		registry.register::<ConveyorMarker<M, D, T>>()?;
		manager_options.validate()?;
		processor_options.validate()?;

		let manager = Arc::new(TaskManager::new(manager_options.max_priority));
		let pool = Arc::new(pool);
		let processor = Processor::new(Arc::clone(&pool));
		let worker_loop = WorkerLoop::new(Arc::clone(&manager), processor);

		let cancel = CancellationToken::new();
		let cancel_for_worker = cancel.clone();
		let worker = tokio::spawn(async move { worker_loop.run(cancel_for_worker).await });

		Ok(Self {
			manager,
			pool,
			transform,
			options: manager_options,
			sequence: AtomicU64::new(0),
			cancel,
			worker,
		})
	}

	/// Inclusive upper bound on priority this service accepts.
	pub fn max_priority(&self) -> u32 {
		self.manager.max_priority()
	}

	/// Enqueues `input` for transformation at priority `0`.
	pub fn process_data(&self, input: D, attempts: u32, inner_cancel: CancellationToken) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		self.process_data_prioritized(input, 0, attempts, inner_cancel)
	}

	/// Enqueues `input` for transformation at the given priority.
	pub fn process_data_prioritized(
		&self,
		input: D,
		priority: u32,
		attempts: u32,
		inner_cancel: CancellationToken,
	) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		if attempts == 0 {
			return Err(QueueError::NonPositiveAttempts);
		}
		let attempts = self.options.combined_attempts(attempts);
		let transform = Arc::clone(&self.transform);
		let work = Arc::new(work_fn(move |machine: &mut M, _scope, cancel: CancellationToken| {
			let transform = Arc::clone(&transform);
			let input = input.clone();
			async move { transform.transform(machine, input, cancel).await }
		}));
		let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
		let (wrapper, rx) = TaskWrapper::new(sequence, work, inner_cancel, attempts);
		self.manager.enqueue(wrapper, priority)?;
		Ok(rx)
	}

	/// Cancels the worker loop, waits for in-flight transforms to drain,
	/// then disposes of any pooled machines left idle.
	pub async fn shutdown(self) {
		tracing::info!("conveyor shutting down");
		self.cancel.cancel();
		let _ = self.worker.await;
		self.pool.dispose().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Doubler;

	#[async_trait]
	impl Transform<(), u32, u32, String> for Doubler {
		async fn transform(&self, _machine: &mut (), input: u32, _cancel: CancellationToken) -> std::result::Result<u32, String> {
			Ok(input * 2)
		}
	}

	#[tokio::test]
	async fn processes_input_through_the_machine() {
		let registry = ServiceRegistry::new();
		let pool = ArgumentPool::null(1);
		let service: ConveyorService<(), u32, u32, String> =
			ConveyorService::new(&registry, TaskManagerOptions::default(), ProcessorOptions::default(), pool, Arc::new(Doubler)).unwrap();

		let rx = service.process_data(21, 1, CancellationToken::new()).unwrap();
		assert_eq!(rx.await.unwrap().unwrap(), 42);

		service.shutdown().await;
	}
}
