#![warn(missing_docs)]

//! The external service surface (§6) of the taskline background execution
//! runtime: work queue, access queue, conveyor, and scheduler services,
//! each a thin façade wiring `taskline-manager`/`taskline-worker` or
//! `taskline-scheduler` machinery together with validated construction
//! options.

mod access_queue;
mod config;
mod conveyor;
mod error;
mod registry;
mod scheduler_service;
mod work_queue;

pub use access_queue::{AccessQueueService, ResourceSource};
pub use config::{ProcessorOptions, ReuseStrategy, SchedulerOptions, TaskManagerOptions};
pub use conveyor::{ConveyorService, Transform};
pub use error::{QueueError, Result};
pub use registry::ServiceRegistry;
pub use scheduler_service::SchedulerService;
pub use work_queue::WorkQueueService;
