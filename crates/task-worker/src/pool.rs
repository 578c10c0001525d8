//! Argument pools backing the processor variants: null, static, reusable,
//! and one-shot lifecycles, each capped by a semaphore sized to the
//! variant's concurrency limit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::capability::Activatable;
use crate::factory::Factory;

enum Kind {
	Static,
	Reusable,
	OneShot,
}

/// A fixed-capacity source of arguments handed to [`crate::processor::Processor`].
///
/// Capacity (the concurrency cap) is the semaphore size: `cap` for
/// reusable/one-shot, or the static set's length for static pools. A
/// "single" variant is simply a multi variant constructed with `cap = 1`.
/// A null-argument pool (no meaningful argument) is modeled as a static
/// pool of `cap` `()` values, see [`ArgumentPool::<()>::null`].
///
/// Factory and activation failures share `Arg::Error` — both are
/// argument-side infrastructure failures, distinct from the task's own
/// result/error type.
pub struct ArgumentPool<Arg: Activatable> {
	kind: Kind,
	bag: Mutex<VecDeque<Arg>>,
	built: AtomicUsize,
	cap: usize,
	factory: Option<Arc<dyn Factory<Arg, Arg::Error>>>,
	permits: Arc<Semaphore>,
}

/// An argument checked out of the pool, paired with the permit that reserves
/// its slot in the concurrency cap.
pub struct PoolSlot<Arg> {
	value: Option<Arg>,
	_permit: OwnedSemaphorePermit,
	dispose: bool,
}

impl<Arg> PoolSlot<Arg> {
	/// Mutable access to the checked-out argument.
	pub fn get_mut(&mut self) -> &mut Arg {
		self.value.as_mut().expect("pool slot holds a value between acquire and release")
	}
}

impl ArgumentPool<()> {
	/// A pool with no meaningful argument, capped at `cap` concurrent uses.
	pub fn null(cap: usize) -> Self {
		Self::static_set(std::iter::repeat_n((), cap.max(1)).collect())
	}
}

impl<Arg> ArgumentPool<Arg>
where
	Arg: Activatable + Send + 'static,
{
	/// A fixed set of arguments supplied up front; the cap is the set's size.
	pub fn static_set(items: Vec<Arg>) -> Self {
		let cap = items.len().max(1);
		Self {
			kind: Kind::Static,
			bag: Mutex::new(items.into()),
			built: AtomicUsize::new(0),
			cap,
			factory: None,
			permits: Arc::new(Semaphore::new(cap)),
		}
	}

	/// A pool lazily grown via `factory` up to `cap` instances, each reused
	/// across tasks.
	pub fn reusable(factory: Arc<dyn Factory<Arg, Arg::Error>>, cap: usize) -> Self {
		Self {
			kind: Kind::Reusable,
			bag: Mutex::new(VecDeque::new()),
			built: AtomicUsize::new(0),
			cap: cap.max(1),
			factory: Some(factory),
			permits: Arc::new(Semaphore::new(cap.max(1))),
		}
	}

	/// A pool that builds a fresh argument per task via `factory` and
	/// disposes of it after use, capped at `cap` concurrent builds.
	pub fn one_shot(factory: Arc<dyn Factory<Arg, Arg::Error>>, cap: usize) -> Self {
		Self {
			kind: Kind::OneShot,
			bag: Mutex::new(VecDeque::new()),
			built: AtomicUsize::new(0),
			cap: cap.max(1),
			factory: Some(factory),
			permits: Arc::new(Semaphore::new(cap.max(1))),
		}
	}

	/// The concurrency cap enforced by this pool.
	pub fn cap(&self) -> usize {
		self.cap
	}

	/// Number of reusable instances built so far (always 0 for other kinds).
	pub fn built(&self) -> usize {
		self.built.load(Ordering::Acquire)
	}

	/// Waits for a free slot, then produces an argument for it.
	///
	/// Returns `None` if `cancel` fires before a slot is free. Returns
	/// `Some(Err(_))` if the argument factory failed to build an instance —
	/// the caller is expected to revert the task it popped and retry on the
	/// next pop rather than rebuild within this call.
	pub async fn acquire(&self, cancel: &CancellationToken) -> Option<Result<PoolSlot<Arg>, Arg::Error>> {
		let permit = tokio::select! {
			biased;
			() = cancel.cancelled() => return None,
			res = Arc::clone(&self.permits).acquire_owned() => res.expect("pool semaphore is never closed"),
		};

		let value = match self.kind {
			Kind::Static => Ok(self.bag.lock().unwrap().pop_front().expect("static pool has one slot per permit")),
			Kind::Reusable => {
				if let Some(existing) = self.bag.lock().unwrap().pop_front() {
					Ok(existing)
				} else {
					let factory = self.factory.as_ref().expect("reusable pool always has a factory");
					match factory.build().await {
						Ok(built) => {
							self.built.fetch_add(1, Ordering::AcqRel);
							Ok(built)
						}
						Err(err) => Err(err),
					}
				}
			}
			Kind::OneShot => {
				let factory = self.factory.as_ref().expect("one-shot pool always has a factory");
				factory.build().await
			}
		};

		match value {
			Ok(value) => Some(Ok(PoolSlot {
				value: Some(value),
				_permit: permit,
				dispose: matches!(self.kind, Kind::OneShot),
			})),
			Err(err) => Some(Err(err)),
		}
	}

	/// Returns a checked-out slot to the pool (static/reusable) or disposes
	/// of it (one-shot), releasing its permit either way.
	pub fn release(&self, mut slot: PoolSlot<Arg>) {
		if let Some(value) = slot.value.take()
			&& !slot.dispose
			&& matches!(self.kind, Kind::Static | Kind::Reusable)
		{
			self.bag.lock().unwrap().push_back(value);
		}
	}

	/// Drops a slot whose argument failed activation rather than returning
	/// it to the bag. For a reusable pool this also decrements the built
	/// count so a later `acquire` rebuilds a fresh instance instead of
	/// believing the pool is already at capacity.
	pub fn discard(&self, mut slot: PoolSlot<Arg>) {
		slot.value.take();
		if matches!(self.kind, Kind::Reusable) {
			self.built.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1))).ok();
		}
	}

	/// Deactivates every argument currently idle in the bag, in place. The
	/// arguments stay in the pool and reactivate lazily on their next
	/// `acquire`; called once a processor's drain leaves nothing in flight,
	/// since deactivated arguments must not sit idle indefinitely.
	pub async fn deactivate_idle(&self) {
		let idle: Vec<Arg> = self.bag.lock().unwrap().drain(..).collect();
		let mut refreshed = Vec::with_capacity(idle.len());
		for mut value in idle {
			if value.is_active() {
				value.deactivate().await;
			}
			refreshed.push(value);
		}
		self.bag.lock().unwrap().extend(refreshed);
	}

	/// Deactivates and drops every argument left idle in the bag. Called
	/// once at service shutdown; the pool is not used again afterward.
	pub async fn dispose(&self) {
		let idle: Vec<Arg> = self.bag.lock().unwrap().drain(..).collect();
		for mut value in idle {
			if value.is_active() {
				value.deactivate().await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::capability::NoActivation;
	use crate::factory::factory_fn;

	#[tokio::test]
	async fn null_pool_hands_out_unit_and_caps_concurrency() {
		let pool = ArgumentPool::null(1);
		let cancel = CancellationToken::new();
		let slot = pool.acquire(&cancel).await.unwrap().unwrap();
		assert!(
			tokio::time::timeout(std::time::Duration::from_millis(20), pool.acquire(&cancel))
				.await
				.is_err()
		);
		pool.release(slot);
		assert!(pool.acquire(&cancel).await.unwrap().is_ok());
	}

	#[tokio::test]
	async fn static_pool_recycles_returned_values() {
		let pool = ArgumentPool::static_set(vec![NoActivation(7u32)]);
		let cancel = CancellationToken::new();
		let mut slot = pool.acquire(&cancel).await.unwrap().unwrap();
		assert_eq!(slot.get_mut().0, 7);
		pool.release(slot);
		let slot = pool.acquire(&cancel).await.unwrap().unwrap();
		assert_eq!(slot.value.unwrap().0, 7);
	}

	#[tokio::test]
	async fn reusable_pool_grows_lazily_up_to_cap() {
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = Arc::clone(&calls);
		let factory = Arc::new(factory_fn(move || {
			let calls = Arc::clone(&calls_clone);
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok::<NoActivation<u32>, std::convert::Infallible>(NoActivation(1))
			}
		}));
		let pool: ArgumentPool<NoActivation<u32>> = ArgumentPool::reusable(factory, 2);
		let cancel = CancellationToken::new();
		let a = pool.acquire(&cancel).await.unwrap().unwrap();
		let b = pool.acquire(&cancel).await.unwrap().unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		pool.release(a);
		pool.release(b);
		let _ = pool.acquire(&cancel).await.unwrap().unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2, "reused instance should not rebuild");
	}

	#[tokio::test]
	async fn one_shot_pool_disposes_after_use() {
		let factory = Arc::new(factory_fn(|| async { Ok::<NoActivation<u32>, std::convert::Infallible>(NoActivation(3)) }));
		let pool: ArgumentPool<NoActivation<u32>> = ArgumentPool::one_shot(factory, 1);
		let cancel = CancellationToken::new();
		let slot = pool.acquire(&cancel).await.unwrap().unwrap();
		pool.release(slot);
		assert_eq!(pool.built(), 0, "one-shot pools never track reuse counts");
	}

	#[tokio::test]
	async fn acquire_returns_none_when_cancelled_while_waiting() {
		let pool = ArgumentPool::null(1);
		let cancel = CancellationToken::new();
		let _slot = pool.acquire(&cancel).await.unwrap().unwrap();
		cancel.cancel();
		assert!(pool.acquire(&cancel).await.is_none());
	}

	struct TrackedActivation {
		active: bool,
		deactivations: Arc<AtomicUsize>,
	}

	#[async_trait::async_trait]
	impl Activatable for TrackedActivation {
		type Error = std::convert::Infallible;
		fn is_active(&self) -> bool {
			self.active
		}
		async fn activate(&mut self) -> Result<(), Self::Error> {
			self.active = true;
			Ok(())
		}
		async fn deactivate(&mut self) {
			self.active = false;
			self.deactivations.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[tokio::test]
	async fn deactivate_idle_deactivates_in_place_and_keeps_the_argument() {
		let deactivations = Arc::new(AtomicUsize::new(0));
		let pool = ArgumentPool::static_set(vec![TrackedActivation {
			active: true,
			deactivations: Arc::clone(&deactivations),
		}]);

		pool.deactivate_idle().await;
		assert_eq!(deactivations.load(Ordering::SeqCst), 1);

		let cancel = CancellationToken::new();
		let slot = pool.acquire(&cancel).await.unwrap().unwrap();
		assert!(!slot.value.as_ref().unwrap().active, "bag contents stay, just deactivated");
	}

	#[tokio::test]
	async fn deactivate_idle_skips_arguments_already_inactive() {
		let deactivations = Arc::new(AtomicUsize::new(0));
		let pool = ArgumentPool::static_set(vec![TrackedActivation {
			active: false,
			deactivations: Arc::clone(&deactivations),
		}]);

		pool.deactivate_idle().await;
		assert_eq!(deactivations.load(Ordering::SeqCst), 0, "already-inactive arguments are left alone");
	}

	#[tokio::test]
	async fn deactivate_idle_does_not_touch_checked_out_arguments() {
		let deactivations = Arc::new(AtomicUsize::new(0));
		let pool = ArgumentPool::static_set(vec![
			TrackedActivation { active: true, deactivations: Arc::clone(&deactivations) },
			TrackedActivation { active: true, deactivations: Arc::clone(&deactivations) },
		]);
		let cancel = CancellationToken::new();
		let checked_out = pool.acquire(&cancel).await.unwrap().unwrap();

		pool.deactivate_idle().await;
		assert_eq!(deactivations.load(Ordering::SeqCst), 1, "only the idle one deactivates");

		pool.release(checked_out);
	}

	#[tokio::test]
	async fn dispose_deactivates_and_drops_idle_arguments() {
		let deactivations = Arc::new(AtomicUsize::new(0));
		let pool = ArgumentPool::static_set(vec![TrackedActivation {
			active: true,
			deactivations: Arc::clone(&deactivations),
		}]);

		pool.dispose().await;
		assert_eq!(deactivations.load(Ordering::SeqCst), 1);
		assert!(pool.bag.lock().unwrap().is_empty(), "disposed arguments are gone, not recycled");
	}
}
