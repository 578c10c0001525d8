//! Argument factories used by the reusable-pool and one-shot pool
//! variants of [`crate::pool::ArgumentPool`].

use std::future::Future;

use async_trait::async_trait;

/// Builds a fresh argument instance on demand.
#[async_trait]
pub trait Factory<Arg, E>: Send + Sync
where
	Arg: Send,
{
	/// Produces one argument instance, or the error that prevented it.
	async fn build(&self) -> Result<Arg, E>;
}

/// Adapts a closure into a [`Factory`] implementation.
pub struct FnFactory<F> {
	f: F,
}

#[async_trait]
impl<Arg, E, F, Fut> Factory<Arg, E> for FnFactory<F>
where
	Arg: Send,
	E: Send,
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<Arg, E>> + Send,
{
	async fn build(&self) -> Result<Arg, E> {
		(self.f)().await
	}
}

/// Builds a [`Factory`] implementation from a closure.
pub fn factory_fn<Arg, E, F, Fut>(f: F) -> FnFactory<F>
where
	Arg: Send,
	E: Send,
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<Arg, E>> + Send,
{
	FnFactory { f }
}
