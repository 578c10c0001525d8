//! Two-source cancellation composition.
//!
//! Every wrapper execution composes an *inner* token (user-driven, set at
//! enqueue/schedule time) with an *outer* token (host-driven, supplied per
//! call). The two are independent `CancellationToken`s — neither is a child
//! of the other — so linking them into a single token a user function can
//! observe requires a small bridging task, the same shape as
//! `schedule_inner` in `xeno-editor`'s work scheduler, which races a
//! doc-level and kind-level token against the work future.

use tokio_util::sync::CancellationToken;

/// Which side of a [`CombinedCancellation`] fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSource {
	/// The inner (user-driven) token was cancelled.
	Inner,
	/// The outer (host-driven) token was cancelled.
	Outer,
}

/// Composes an inner and an outer cancellation token for one wrapper
/// execution.
#[derive(Debug, Clone)]
pub struct CombinedCancellation {
	inner: CancellationToken,
	outer: CancellationToken,
}

impl CombinedCancellation {
	/// Creates a new composition over the given tokens.
	pub fn new(inner: CancellationToken, outer: CancellationToken) -> Self {
		Self { inner, outer }
	}

	/// The inner (user-driven) token.
	pub fn inner(&self) -> &CancellationToken {
		&self.inner
	}

	/// The outer (host-driven) token.
	pub fn outer(&self) -> &CancellationToken {
		&self.outer
	}

	/// True if the inner token has fired.
	pub fn is_inner_cancelled(&self) -> bool {
		self.inner.is_cancelled()
	}

	/// True if the outer token has fired.
	pub fn is_outer_cancelled(&self) -> bool {
		self.outer.is_cancelled()
	}

	/// True if either source has fired.
	pub fn is_cancelled(&self) -> bool {
		self.is_inner_cancelled() || self.is_outer_cancelled()
	}

	/// Waits until either source fires, returning which one.
	pub async fn cancelled(&self) -> CancelSource {
		tokio::select! {
			biased;
			() = self.inner.cancelled() => CancelSource::Inner,
			() = self.outer.cancelled() => CancelSource::Outer,
		}
	}

	/// Produces a single token that cancels when either source does, for
	/// handing to user async work. The bridging task backing the token is
	/// aborted when the returned [`LinkedCancellation`] is dropped, so the
	/// linkage does not outlive one execution.
	pub fn link(&self) -> LinkedCancellation {
		let token = CancellationToken::new();
		let fired = token.clone();
		let inner = self.inner.clone();
		let outer = self.outer.clone();
		let bridge = tokio::spawn(async move {
			tokio::select! {
				biased;
				() = inner.cancelled() => {}
				() = outer.cancelled() => {}
			}
			fired.cancel();
		});
		LinkedCancellation { token, bridge }
	}
}

/// A single cancellation token that tracks both sources of a
/// [`CombinedCancellation`] for the duration of one execution.
pub struct LinkedCancellation {
	token: CancellationToken,
	bridge: tokio::task::JoinHandle<()>,
}

impl std::ops::Deref for LinkedCancellation {
	type Target = CancellationToken;

	fn deref(&self) -> &CancellationToken {
		&self.token
	}
}

impl Drop for LinkedCancellation {
	fn drop(&mut self) {
		self.bridge.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn cancelled_reports_inner_first_when_both_fire() {
		let inner = CancellationToken::new();
		let outer = CancellationToken::new();
		let combined = CombinedCancellation::new(inner.clone(), outer.clone());
		inner.cancel();
		outer.cancel();
		assert_eq!(combined.cancelled().await, CancelSource::Inner);
	}

	#[tokio::test]
	async fn link_fires_when_outer_cancels() {
		let inner = CancellationToken::new();
		let outer = CancellationToken::new();
		let combined = CombinedCancellation::new(inner, outer.clone());
		let linked = combined.link();
		assert!(!linked.is_cancelled());
		outer.cancel();
		linked.cancelled().await;
		assert!(linked.is_cancelled());
	}

	#[tokio::test]
	async fn is_cancelled_reflects_either_source() {
		let inner = CancellationToken::new();
		let outer = CancellationToken::new();
		let combined = CombinedCancellation::new(inner.clone(), outer);
		assert!(!combined.is_cancelled());
		inner.cancel();
		assert!(combined.is_cancelled());
		assert!(combined.is_inner_cancelled());
		assert!(!combined.is_outer_cancelled());
	}
}
