use chrono::{DateTime, Utc};

/// Injectable notion of "now" so session/evaluator tests are deterministic.
///
/// The default `SystemClock` is what every production call site uses; tests
/// substitute a `FixedClock` rather than sleeping or racing the wall clock.
pub trait Clock: Send + Sync + std::fmt::Debug {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_clock_never_moves() {
		let t = Utc::now();
		let c = FixedClock(t);
		assert_eq!(c.now(), t);
		assert_eq!(c.now(), t);
	}
}
