//! Construction-time configuration for the queue services (§6's option
//! table). Validated eagerly at service construction, never parsed from a
//! file here — that belongs to the out-of-scope host/DI layer.

use std::time::Duration;

use crate::error::{QueueError, Result};

/// Options for a priority task manager.
#[derive(Debug, Clone)]
pub struct TaskManagerOptions {
	/// Inclusive upper bound on priority for priority variants.
	pub max_priority: u32,
	/// Upper bound on retries per task; combined by `min` with the
	/// per-call `attempts` count. `None` means unbounded.
	pub max_attempts: Option<u32>,
}

impl Default for TaskManagerOptions {
	fn default() -> Self {
		Self {
			max_priority: 100,
			max_attempts: None,
		}
	}
}

impl TaskManagerOptions {
	/// No invalid states are representable today; kept for symmetry with
	/// the other option structs and as a stable extension point.
	pub fn validate(&self) -> Result<()> {
		Ok(())
	}

	/// The effective attempts count for one enqueue call: the smaller of
	/// the per-call request and this manager's configured cap.
	pub fn combined_attempts(&self, requested: u32) -> u32 {
		match self.max_attempts {
			Some(cap) => requested.min(cap),
			None => requested,
		}
	}
}

/// Argument-lifecycle strategy for access-queue and conveyor processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseStrategy {
	/// A fixed set supplied up front, recycled across tasks.
	Static,
	/// Lazily grown via a factory, up to a cap, and reused.
	Reuse,
	/// Built fresh per task and disposed after use.
	OneTime,
}

/// Options for a task processor.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
	/// Cap on concurrent in-flight tasks for null-argument processors.
	pub max_parallel_tasks: usize,
	/// Argument-lifecycle strategy for access-queue/conveyor processors.
	pub reuse_strategy: ReuseStrategy,
	/// For pooled strategies, the maximum argument cardinality.
	pub max_simultaneous: usize,
}

impl Default for ProcessorOptions {
	fn default() -> Self {
		Self {
			max_parallel_tasks: 1,
			reuse_strategy: ReuseStrategy::OneTime,
			max_simultaneous: 1,
		}
	}
}

impl ProcessorOptions {
	/// Validates that the configured caps are usable as semaphore/pool
	/// sizes.
	pub fn validate(&self) -> Result<()> {
		if self.max_parallel_tasks == 0 {
			return Err(QueueError::InvalidOption("maxParallelTasks must be positive".to_string()));
		}
		if self.max_simultaneous == 0 {
			return Err(QueueError::InvalidOption("maxSimultaneous must be positive".to_string()));
		}
		Ok(())
	}
}

/// Options for the scheduler worker.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
	/// Look-ahead window when slicing upcoming batches and capping sleeps.
	pub horizon: Duration,
	/// Execution budget for recurring scheduled work; `-1` means unbounded.
	pub exec_count: i64,
}

impl Default for SchedulerOptions {
	fn default() -> Self {
		Self {
			horizon: Duration::from_secs(60),
			exec_count: -1,
		}
	}
}

impl SchedulerOptions {
	/// Validates that the horizon is usable as a sleep cap.
	pub fn validate(&self) -> Result<()> {
		if self.horizon.is_zero() {
			return Err(QueueError::InvalidOption("horizon must be positive".to_string()));
		}
		if self.exec_count < -1 {
			return Err(QueueError::InvalidOption("execCount must be -1 (unlimited) or a non-negative budget".to_string()));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn task_manager_options_default_matches_spec_table() {
		let options = TaskManagerOptions::default();
		assert_eq!(options.max_priority, 100);
		assert_eq!(options.max_attempts, None);
	}

	#[test]
	fn combined_attempts_takes_the_minimum() {
		let options = TaskManagerOptions {
			max_attempts: Some(3),
			..Default::default()
		};
		assert_eq!(options.combined_attempts(10), 3);
		assert_eq!(options.combined_attempts(2), 2);
	}

	#[test]
	fn processor_options_reject_zero_caps() {
		let options = ProcessorOptions {
			max_parallel_tasks: 0,
			..Default::default()
		};
		assert!(options.validate().is_err());
	}

	#[test]
	fn scheduler_options_reject_zero_horizon() {
		let options = SchedulerOptions {
			horizon: Duration::ZERO,
			..Default::default()
		};
		assert!(options.validate().is_err());
	}
}
