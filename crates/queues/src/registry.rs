//! Minimal registration-conflict tracking for the service surface (§7).
//!
//! Replaces the out-of-scope DI container: callers share one [`ServiceRegistry`]
//! per host process and each service registers itself under a marker type
//! (the resource type `R` for an access queue, the `(D, T)` pair for a
//! conveyor) at construction, so two services competing for the same kind
//! fail synchronously instead of silently double-serializing a resource.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{QueueError, Result};

/// Tracks which service "kinds" have already been constructed.
#[derive(Default)]
pub struct ServiceRegistry {
	registered: Mutex<HashSet<TypeId>>,
}

impl ServiceRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `Marker` as live. Fails if it was already registered.
	pub fn register<Marker: 'static>(&self) -> Result<()> {
		let inserted = self.registered.lock().unwrap().insert(TypeId::of::<Marker>());
		if inserted { Ok(()) } else { Err(QueueError::DuplicateRegistration) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct MarkerA;
	struct MarkerB;

	#[test]
	fn second_registration_of_the_same_marker_conflicts() {
		let registry = ServiceRegistry::new();
		registry.register::<MarkerA>().unwrap();
		registry.register::<MarkerB>().unwrap();
		assert!(matches!(registry.register::<MarkerA>(), Err(QueueError::DuplicateRegistration)));
	}
}
