//! Wall-clock abstraction shared by quota windows and token expiry arithmetic.

// self
use crate::_prelude::*;

/// Shared, thread-safe clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Source of the current wall-clock instant.
pub trait Clock
where
	Self: Debug + Send + Sync,
{
	/// Returns the current instant in UTC.
	fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system's UTC time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Returns a shared handle to the system clock.
pub fn system() -> SharedClock {
	Arc::new(SystemClock)
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same instant, so advancing one handle moves every component holding it.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at the provided instant.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward (or backward for negative values).
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps the clock to the provided instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Returns a shared handle suitable for injection.
	pub fn shared(&self) -> SharedClock {
		Arc::new(self.clone())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_state() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let shared = clock.shared();

		clock.advance(Duration::seconds(90));

		assert_eq!(shared.now(), macros::datetime!(2025-01-01 00:01:30 UTC));

		clock.set(macros::datetime!(2024-12-31 23:00 UTC));

		assert_eq!(shared.now(), macros::datetime!(2024-12-31 23:00 UTC));
	}
}
