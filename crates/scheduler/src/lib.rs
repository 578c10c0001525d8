#![warn(missing_docs)]

//! Calendar and interval scheduling for the taskline background execution
//! runtime: scheduled-task wrappers with once/fixed-interval/cron
//! recurrence, the time-ordered scheduler manager, and its worker loop.

mod clock;
mod error;
mod manager;
mod recurrence;
mod worker;
mod wrapper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SchedulerError};
pub use manager::SchedulerManager;
pub use recurrence::Recurrence;
pub use worker::SchedulerWorker;
pub use wrapper::ScheduledTaskWrapper;
