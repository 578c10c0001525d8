#![warn(missing_docs)]

//! Argument-lifecycle task processor and worker loop for the taskline
//! background execution runtime.

mod capability;
mod factory;
mod pool;
mod processor;
mod worker;

pub use capability::{Activatable, NoActivation, Throttled};
pub use factory::{FnFactory, Factory, factory_fn};
pub use pool::{ArgumentPool, PoolSlot};
pub use processor::Processor;
pub use worker::WorkerLoop;
