//! Work-queue service (§6): the plain priority queue over null-argument
//! work, with no shared resource and no data transformation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use taskline_core::{TaskResult, TaskWrapper, Work};
use taskline_manager::TaskManager;
use taskline_worker::{ArgumentPool, Processor, WorkerLoop};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{ProcessorOptions, TaskManagerOptions};
use crate::error::{QueueError, Result};
use crate::registry::ServiceRegistry;

struct WorkQueueMarker;

/// `enqueueWork(W, attempts, cancellation)` and its priority variant (§6).
pub struct WorkQueueService<T, E> {
	manager: Arc<TaskManager<(), T, E>>,
	pool: Arc<ArgumentPool<()>>,
	options: TaskManagerOptions,
	sequence: AtomicU64,
	cancel: CancellationToken,
	worker: tokio::task::JoinHandle<()>,
}

impl<T, E> WorkQueueService<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds the service and spawns its worker loop immediately.
	pub fn new(registry: &ServiceRegistry, manager_options: TaskManagerOptions, processor_options: ProcessorOptions) -> Result<Self> {
		registry.register::<WorkQueueMarker>()?;
		manager_options.validate()?;
		processor_options.validate()?;

		let manager = Arc::new(TaskManager::new(manager_options.max_priority));
		let pool = Arc::new(ArgumentPool::null(processor_options.max_parallel_tasks));
		let processor = Processor::new(Arc::clone(&pool));
		let worker_loop = WorkerLoop::new(Arc::clone(&manager), processor);

		let cancel = CancellationToken::new();
		let cancel_for_worker = cancel.clone();
		let worker = tokio::spawn(async move { worker_loop.run(cancel_for_worker).await });

		Ok(Self {
			manager,
			pool,
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

	/// Enqueues `work` at priority `0`, allowing up to `attempts` executions.
	pub fn enqueue_work(&self, work: Arc<dyn Work<(), T, E>>, attempts: u32, inner_cancel: CancellationToken) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		self.enqueue_prioritized(work, 0, attempts, inner_cancel)
	}

	/// Enqueues `work` at the given priority.
	pub fn enqueue_prioritized(
		&self,
		work: Arc<dyn Work<(), T, E>>,
		priority: u32,
		attempts: u32,
		inner_cancel: CancellationToken,
	) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		if attempts == 0 {
			return Err(QueueError::NonPositiveAttempts);
		}
		let attempts = self.options.combined_attempts(attempts);
		let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
		let (wrapper, rx) = TaskWrapper::new(sequence, work, inner_cancel, attempts);
		self.manager.enqueue(wrapper, priority)?;
		Ok(rx)
	}

	/// Cancels the worker loop's outer token, waits for it to exit draining
	/// whatever is currently in flight, then disposes of any pooled
	/// arguments left idle.
	pub async fn shutdown(self) {
		tracing::info!("work queue shutting down");
		self.cancel.cancel();
		let _ = self.worker.await;
		self.pool.dispose().await;
	}
}

#[cfg(test)]
mod tests {
	use taskline_core::work_fn;

	use super::*;

	#[tokio::test]
	async fn enqueued_work_executes_and_resolves() {
		let registry = ServiceRegistry::new();
		let service: WorkQueueService<u32, String> = WorkQueueService::new(&registry, TaskManagerOptions::default(), ProcessorOptions::default()).unwrap();

		let work = Arc::new(work_fn(|_: &mut (), _scope, _cancel| async { Ok::<u32, String>(42) }));
		let rx = service.enqueue_work(work, 1, CancellationToken::new()).unwrap();
		assert_eq!(rx.await.unwrap().unwrap(), 42);

		service.shutdown().await;
	}

	#[tokio::test]
	async fn priority_above_max_is_rejected() {
		let registry = ServiceRegistry::new();
		let manager_options = TaskManagerOptions {
			max_priority: 1,
			..Default::default()
		};
		let service: WorkQueueService<u32, String> = WorkQueueService::new(&registry, manager_options, ProcessorOptions::default()).unwrap();

		let work = Arc::new(work_fn(|_: &mut (), _scope, _cancel| async { Ok::<u32, String>(0) }));
		let err = service.enqueue_prioritized(work, 5, 1, CancellationToken::new()).unwrap_err();
		assert!(matches!(err, QueueError::Manager(_)));
		service.shutdown().await;
	}

	#[tokio::test]
	async fn zero_attempts_is_rejected() {
		let registry = ServiceRegistry::new();
		let service: WorkQueueService<u32, String> = WorkQueueService::new(&registry, TaskManagerOptions::default(), ProcessorOptions::default()).unwrap();
		let work = Arc::new(work_fn(|_: &mut (), _scope, _cancel| async { Ok::<u32, String>(0) }));
		assert!(matches!(
			service.enqueue_work(work, 0, CancellationToken::new()),
			Err(QueueError::NonPositiveAttempts)
		));
		service.shutdown().await;
	}
}
