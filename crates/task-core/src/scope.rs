//! The per-execution scope handed to user work.

use uuid::Uuid;

/// A scope value passed to user work for the duration of one execution.
///
/// Its lifetime encloses exactly one wrapper execution: anything resolved
/// against it (a checked-out connection, a tracing guard) must not outlive
/// the call that received it. A worker loop opens one scope per iteration;
/// each dispatched task then derives its own [`Self::child`] scope from it,
/// so a task's scope can be traced back to the iteration that launched it
/// without the two sharing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestScope {
	id: Uuid,
	parent: Option<Uuid>,
}

impl RequestScope {
	/// Opens a new top-level scope.
	pub fn new() -> Self {
		Self { id: Uuid::new_v4(), parent: None }
	}

	/// Opens a scope nested under this one.
	pub fn child(&self) -> Self {
		Self {
			id: Uuid::new_v4(),
			parent: Some(self.id),
		}
	}

	/// This scope's own identifier.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// The enclosing scope's identifier, if this scope was opened via
	/// [`Self::child`].
	pub fn parent_id(&self) -> Option<Uuid> {
		self.parent
	}
}

impl Default for RequestScope {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn child_scope_records_its_parent() {
		let parent = RequestScope::new();
		let child = parent.child();
		assert_eq!(child.parent_id(), Some(parent.id()));
		assert_ne!(child.id(), parent.id());
	}

	#[test]
	fn top_level_scope_has_no_parent() {
		let scope = RequestScope::new();
		assert_eq!(scope.parent_id(), None);
	}
}
