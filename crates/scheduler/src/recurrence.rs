//! Recurrence policies for the scheduled-task wrapper.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// How a scheduled wrapper's next due time advances.
pub enum Recurrence {
	/// Fires once at a fixed time, then never again.
	Once {
		/// The single due time.
		at: DateTime<Utc>,
		/// Set once the single occurrence has executed.
		fired: bool,
	},
	/// Fires every `period`, starting at (or catching up to) `next`.
	FixedInterval {
		/// The next due time.
		next: DateTime<Utc>,
		/// The gap between occurrences.
		period: chrono::Duration,
	},
	/// Fires on each occurrence of a cron expression, recomputed from the
	/// wall clock on every query rather than cached.
	Cron {
		/// The parsed cron schedule.
		schedule: Schedule,
	},
}

impl Recurrence {
	/// A single occurrence at `at`, which must be strictly after `now`.
	pub fn once(at: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self> {
		if at <= now {
			return Err(SchedulerError::PastTime);
		}
		Ok(Self::Once { at, fired: false })
	}

	/// Occurrences every `period`, starting at `start`. If `start` already
	/// lies in the past, catches up by whole periods until the first due
	/// time is `>= now`.
	pub fn fixed_interval(start: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> Result<Self> {
		if period.is_zero() {
			return Err(SchedulerError::NonPositivePeriod);
		}
		let period = chrono::Duration::from_std(period).map_err(|_| SchedulerError::NonPositivePeriod)?;
		let mut next = start;
		while next < now {
			next += period;
		}
		Ok(Self::FixedInterval { next, period })
	}

	/// Occurrences driven by a cron expression (seconds-resolution, per the
	/// underlying parser).
	pub fn cron(expr: &str) -> Result<Self> {
		let schedule: Schedule = expr.parse().map_err(|err: cron::error::Error| SchedulerError::InvalidCron(err.to_string()))?;
		Ok(Self::Cron { schedule })
	}

	/// The next due time, or `None` if this recurrence has nothing left to
	/// fire (a spent one-shot). Cron schedules are recomputed fresh against
	/// `now` rather than cached.
	pub fn next_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
		match self {
			Self::Once { at, fired } => (!fired).then_some(*at),
			Self::FixedInterval { next, .. } => Some(*next),
			Self::Cron { schedule } => schedule.after(&now).next(),
		}
	}

	/// Advances past the occurrence that just fired.
	pub fn advance(&mut self) {
		match self {
			Self::Once { fired, .. } => *fired = true,
			Self::FixedInterval { next, period } => *next += *period,
			Self::Cron { .. } => {}
		}
	}
}
