//! The user-supplied unit of work a task wrapper executes.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::scope::RequestScope;

/// A unit of work that consumes (and may mutate) an argument and produces a
/// result, cooperating with a request scope and a cancellation token.
///
/// Implemented directly for long-lived work types, or built ad hoc with
/// [`work_fn`] for closures — mirroring `tower::service_fn`.
#[async_trait]
pub trait Work<Arg, T, E>: Send + Sync
where
	Arg: Send + 'static,
{
	/// Runs the work once against `arg` under `scope`, observing `cancel`
	/// cooperatively. `scope` is valid for the duration of this call only.
	async fn call(&self, arg: &mut Arg, scope: RequestScope, cancel: CancellationToken) -> Result<T, E>;
}

/// Adapts a closure into a [`Work`] implementation.
pub struct FnWork<F> {
	f: F,
}

#[async_trait]
impl<Arg, T, E, F, Fut> Work<Arg, T, E> for FnWork<F>
where
	Arg: Send + 'static,
	T: Send,
	E: Send,
	F: Fn(&mut Arg, RequestScope, CancellationToken) -> Fut + Send + Sync,
	Fut: Future<Output = Result<T, E>> + Send,
{
	async fn call(&self, arg: &mut Arg, scope: RequestScope, cancel: CancellationToken) -> Result<T, E> {
		(self.f)(arg, scope, cancel).await
	}
}

/// Builds a [`Work`] implementation from a closure.
pub fn work_fn<Arg, T, E, F, Fut>(f: F) -> FnWork<F>
where
	Arg: Send + 'static,
	T: Send,
	E: Send,
	F: Fn(&mut Arg, RequestScope, CancellationToken) -> Fut + Send + Sync,
	Fut: Future<Output = Result<T, E>> + Send,
{
	FnWork { f }
}
