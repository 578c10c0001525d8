//! Access-queue service (§6): serializes (or pools) access to a shared
//! resource `R`, one service per resource type.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use taskline_core::{TaskResult, TaskWrapper, Work};
use taskline_manager::TaskManager;
use taskline_worker::{Activatable, ArgumentPool, Factory, Processor, Throttled, WorkerLoop};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{ProcessorOptions, ReuseStrategy, TaskManagerOptions};
use crate::error::{QueueError, Result};
use crate::registry::ServiceRegistry;

/// How resource instances of `R` are supplied to an [`AccessQueueService`].
pub enum ResourceSource<R: Activatable> {
	/// A fixed set, recycled across tasks (`ReuseStrategy::Static`).
	Static(Vec<R>),
	/// A factory, used for `Reuse` (lazily grown, kept) and `OneTime`
	/// (built per task, disposed).
	Factory(Arc<dyn Factory<R, R::Error>>),
}

/// `enqueueAccess(A<R>, attempts, cancellation)` and its priority variant
/// (§6). One service exists per resource type `R`.
pub struct AccessQueueService<R: Activatable, T, E> {
	manager: Arc<TaskManager<R, T, E>>,
	pool: Arc<ArgumentPool<R>>,
	options: TaskManagerOptions,
	sequence: AtomicU64,
	cancel: CancellationToken,
	worker: tokio::task::JoinHandle<()>,
}

impl<R, T, E> AccessQueueService<R, T, E>
where
	R: Activatable + Throttled + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	/// Builds the service over resource `R`, sourced per `processor_options.reuse_strategy`.
	pub fn new(
		registry: &ServiceRegistry,
		manager_options: TaskManagerOptions,
		processor_options: ProcessorOptions,
		source: ResourceSource<R>,
	) -> Result<Self> {
		registry.register::<R>()?;
		manager_options.validate()?;
		processor_options.validate()?;

		let pool = match (processor_options.reuse_strategy, source) {
			(ReuseStrategy::Static, ResourceSource::Static(items)) => ArgumentPool::static_set(items),
			(ReuseStrategy::Reuse, ResourceSource::Factory(factory)) => ArgumentPool::reusable(factory, processor_options.max_simultaneous),
			(ReuseStrategy::OneTime, ResourceSource::Factory(factory)) => ArgumentPool::one_shot(factory, processor_options.max_simultaneous),
			_ => return Err(QueueError::InvalidOption("resource source does not match the configured reuse strategy".to_string())),
		};

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

	/// Enqueues access work at priority `0`.
	pub fn enqueue_access(&self, work: Arc<dyn Work<R, T, E>>, attempts: u32, inner_cancel: CancellationToken) -> Result<oneshot::Receiver<TaskResult<T, E>>> {
		self.enqueue_prioritized(work, 0, attempts, inner_cancel)
	}

	/// Enqueues access work at the given priority.
	pub fn enqueue_prioritized(
		&self,
		work: Arc<dyn Work<R, T, E>>,
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

	/// Cancels the worker loop, waits for in-flight access work to drain,
	/// then disposes of any pooled resources left idle.
	pub async fn shutdown(self) {
		tracing::info!("access queue shutting down");
		self.cancel.cancel();
		let _ = self.worker.await;
		self.pool.dispose().await;
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use taskline_core::work_fn;
	use taskline_worker::NoActivation;

	use super::*;

	struct Counter;

	#[async_trait]
	impl Activatable for Counter {
		type Error = std::convert::Infallible;
		fn is_active(&self) -> bool {
			true
		}
		async fn activate(&mut self) -> std::result::Result<(), Self::Error> {
			Ok(())
		}
		async fn deactivate(&mut self) {}
	}
	impl Throttled for Counter {
		fn throttle_delay(&self) -> Option<std::time::Duration> {
			None
		}
	}

	#[tokio::test]
	async fn static_resource_serializes_access() {
		let registry = ServiceRegistry::new();
		let service: AccessQueueService<Counter, u32, String> = AccessQueueService::new(
			&registry,
			TaskManagerOptions::default(),
			ProcessorOptions {
				reuse_strategy: ReuseStrategy::Static,
				..Default::default()
			},
			ResourceSource::Static(vec![Counter]),
		)
		.unwrap();

		let work = Arc::new(work_fn(|_resource: &mut Counter, _scope, _cancel| async { Ok::<u32, String>(1) }));
		let rx = service.enqueue_access(work, 1, CancellationToken::new()).unwrap();
		assert_eq!(rx.await.unwrap().unwrap(), 1);

		service.shutdown().await;
	}

	#[tokio::test]
	async fn second_registration_of_the_same_resource_type_conflicts() {
		let registry = ServiceRegistry::new();
		let first: AccessQueueService<NoActivation<u32>, u32, String> =
			AccessQueueService::new(&registry, TaskManagerOptions::default(), ProcessorOptions::default(), ResourceSource::Static(vec![NoActivation(1)])).unwrap();

		let err = AccessQueueService::<NoActivation<u32>, u32, String>::new(
			&registry,
			TaskManagerOptions::default(),
			ProcessorOptions::default(),
			ResourceSource::Static(vec![NoActivation(2)]),
		)
		.unwrap_err();
		assert!(matches!(err, QueueError::DuplicateRegistration));
		first.shutdown().await;
	}
}
