//! Wall-clock abstraction.
//!
//! Cron and fixed-interval recurrence compute their next occurrence against
//! the real wall clock on each query, which is independent of `tokio::time`'s
//! mockable clock. Tests that need deterministic cron/fixed-interval
//! behavior drive a [`ManualClock`] instead of [`SystemClock`].

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of the current time, swappable for deterministic tests.
pub trait Clock: Send + Sync {
	/// The current wall-clock time.
	fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only advances when told to, for scenarios that need
/// reproducible cron ticks or catch-up windows.
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	/// Creates a manual clock starting at `start`.
	pub fn new(start: DateTime<Utc>) -> Self {
		Self { now: Mutex::new(start) }
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		let mut now = self.now.lock().unwrap();
		*now += chrono::Duration::from_std(delta).expect("advance delta fits in a chrono::Duration");
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap()
	}
}
