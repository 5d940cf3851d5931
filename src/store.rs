//! Counter-store contracts and the built-in local, shared, and fail-over implementations.
//!
//! Every implementation exposes the same atomic increment-and-expire primitive: the first
//! increment of a fresh window fixes the window's absolute reset instant, later increments inside
//! the window only bump the count, and the window restarts once `now >= reset_at`.

pub mod failover;
pub mod memory;
#[cfg(feature = "redis")] pub mod shared;

pub use failover::{FailoverConfig, FailoverCounterStore};
pub use memory::{MemoryCounterStore, SweepHandle};
#[cfg(feature = "redis")] pub use shared::RedisCounterStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CounterStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for fixed-window counters.
pub trait CounterStore
where
	Self: Send + Sync,
{
	/// Atomically increments `key`, starting a fresh `window` when none is active.
	fn increment_and_expire<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, WindowSnapshot>;

	/// Clears the counter for `key` immediately.
	fn reset<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Reads the count of the active window for `key`, or zero when none is active.
	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, u64>;

	/// Releases background tasks and connections held by the store.
	fn close(&self) -> StoreFuture<'_, ()>;
}

/// Post-increment view of a quota window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
	/// Requests counted in the active window, including the current one.
	pub count: u64,
	/// Instant at which the window resets.
	#[serde(with = "time::serde::rfc3339")]
	pub reset_at: OffsetDateTime,
}

/// Error type produced by [`CounterStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The backend could not be reached.
	#[error("Counter store is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend did not answer within the configured bound.
	#[error("Counter store did not respond within {after_ms} ms.")]
	Timeout {
		/// Elapsed bound in milliseconds.
		after_ms: u64,
	},
	/// The backend answered with something unexpected.
	#[error("Counter store backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The store was closed and no longer accepts calls.
	#[error("Counter store is closed.")]
	Closed,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn window_snapshot_serializes_reset_as_rfc3339() {
		let snapshot = WindowSnapshot {
			count: 3,
			reset_at: time::macros::datetime!(2025-11-10 12:15 UTC),
		};
		let payload =
			serde_json::to_string(&snapshot).expect("Window snapshot should serialize to JSON.");

		assert_eq!(payload, "{\"count\":3,\"reset_at\":\"2025-11-10T12:15:00Z\"}");
	}

	#[test]
	fn timeout_error_mentions_bound() {
		assert_eq!(
			StoreError::Timeout { after_ms: 250 }.to_string(),
			"Counter store did not respond within 250 ms."
		);
	}
}
