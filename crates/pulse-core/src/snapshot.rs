use std::sync::Arc;

use arc_swap::ArcSwap;

/// A value that is read far more often than it is written.
///
/// Mutations replace the pointer atomically (`ArcSwap::store`); readers never
/// block a writer and never observe a torn value. This is the mechanism
/// behind "Entitlement reads are eventually consistent with billing-state
/// writes" (spec.md §5): a write is visible to the next `load`, but a read
/// that is already in flight keeps the `Arc` it loaded.
#[derive(Debug)]
pub struct Snapshot<T>(ArcSwap<T>);

impl<T> Snapshot<T> {
	pub fn new(value: T) -> Self {
		Self(ArcSwap::from_pointee(value))
	}

	pub fn load(&self) -> Arc<T> {
		self.0.load_full()
	}

	pub fn store(&self, value: T) {
		self.0.store(Arc::new(value));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn store_is_visible_to_next_load() {
		let snap = Snapshot::new(1);
		assert_eq!(*snap.load(), 1);
		snap.store(2);
		assert_eq!(*snap.load(), 2);
	}

	#[test]
	fn in_flight_load_keeps_old_value() {
		let snap = Snapshot::new(1);
		let held = snap.load();
		snap.store(2);
		assert_eq!(*held, 1);
		assert_eq!(*snap.load(), 2);
	}
}
