//! Optional capabilities an argument may expose to the processor: activation
//! around a batch of uses, and a minimum gap between uses.

use std::time::Duration;

use async_trait::async_trait;

/// An argument that needs to be opened before use and closed once the
/// processor is done handing it out.
///
/// Resources that don't need this lifecycle can use [`NoActivation`] as a
/// zero-cost wrapper, or implement the trait with a no-op body.
#[async_trait]
pub trait Activatable: Send {
	/// The error type surfaced when `activate` fails.
	type Error: Send + std::fmt::Debug;

	/// True iff the argument is ready to use without calling [`activate`](Self::activate).
	fn is_active(&self) -> bool;

	/// Brings the argument into a usable state.
	async fn activate(&mut self) -> Result<(), Self::Error>;

	/// Releases whatever `activate` acquired. Infallible by contract — a
	/// deactivation that can fail should log and swallow the error itself.
	async fn deactivate(&mut self);
}

/// An argument imposing a minimum wall-clock gap between consecutive uses.
pub trait Throttled {
	/// The minimum delay to wait before the next use, if any.
	fn throttle_delay(&self) -> Option<Duration>;
}

/// Wraps any value to opt it out of both capabilities: always active, never
/// throttled.
pub struct NoActivation<Arg>(pub Arg);

#[async_trait]
impl<Arg: Send> Activatable for NoActivation<Arg> {
	type Error = std::convert::Infallible;

	fn is_active(&self) -> bool {
		true
	}

	async fn activate(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}

	async fn deactivate(&mut self) {}
}

impl<Arg> Throttled for NoActivation<Arg> {
	fn throttle_delay(&self) -> Option<Duration> {
		None
	}
}

#[async_trait]
impl Activatable for () {
	type Error = std::convert::Infallible;

	fn is_active(&self) -> bool {
		true
	}

	async fn activate(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}

	async fn deactivate(&mut self) {}
}

impl Throttled for () {
	fn throttle_delay(&self) -> Option<Duration> {
		None
	}
}
