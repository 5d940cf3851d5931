//! Redis-backed [`CounterStore`] shared by every process of a deployment.

// crates.io
use ::redis::{Client, RedisError, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	clock::SharedClock,
	store::{CounterStore, StoreError, StoreFuture, WindowSnapshot},
};

// One round-trip: increment, then attach the expiry only when the key has none yet. Returns the
// post-increment count and the remaining window in milliseconds.
const INCREMENT_AND_EXPIRE: &str = r"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
	redis.call('PEXPIRE', KEYS[1], ARGV[1])
	ttl = tonumber(ARGV[1])
end
return { count, ttl }
";

/// Counter store backed by a Redis-compatible server (Redis, Valkey, Dragonfly).
///
/// Increments run as a single server-side script so concurrent callers on the same key can
/// neither lose updates nor miss the expiry assignment.
pub struct RedisCounterStore {
	connection: RwLock<Option<ConnectionManager>>,
	script: Script,
	clock: SharedClock,
}
impl RedisCounterStore {
	/// Connects to the server at `url` and verifies it answers `PING`.
	pub async fn connect(url: &str, clock: SharedClock) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(|e| StoreError::Backend {
			message: format!("Invalid counter store URL: {e}"),
		})?;
		let mut connection = ConnectionManager::new(client).await.map_err(unavailable)?;
		let _: String = ::redis::cmd("PING").query_async(&mut connection).await.map_err(unavailable)?;

		Ok(Self::with_connection(connection, clock))
	}

	/// Wraps an existing connection manager.
	pub fn with_connection(connection: ConnectionManager, clock: SharedClock) -> Self {
		Self {
			connection: RwLock::new(Some(connection)),
			script: Script::new(INCREMENT_AND_EXPIRE),
			clock,
		}
	}

	fn connection(&self) -> Result<ConnectionManager, StoreError> {
		self.connection.read().clone().ok_or(StoreError::Closed)
	}
}
impl Debug for RedisCounterStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCounterStore")
			.field("connected", &self.connection.read().is_some())
			.finish()
	}
}
impl CounterStore for RedisCounterStore {
	fn increment_and_expire<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, WindowSnapshot> {
		Box::pin(async move {
			let mut connection = self.connection()?;
			let window_ms = i64::try_from(window.whole_milliseconds()).unwrap_or(i64::MAX).max(1);
			let (count, ttl_ms): (u64, i64) = self
				.script
				.key(key)
				.arg(window_ms)
				.invoke_async(&mut connection)
				.await
				.map_err(unavailable)?;
			let reset_at = self.clock.now() + Duration::milliseconds(ttl_ms.max(0));

			Ok(WindowSnapshot { count, reset_at })
		})
	}

	fn reset<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut connection = self.connection()?;
			let _: i64 =
				::redis::cmd("DEL").arg(key).query_async(&mut connection).await.map_err(unavailable)?;

			Ok(())
		})
	}

	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let mut connection = self.connection()?;
			let count: Option<u64> =
				::redis::cmd("GET").arg(key).query_async(&mut connection).await.map_err(unavailable)?;

			Ok(count.unwrap_or(0))
		})
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		self.connection.write().take();

		Box::pin(async { Ok(()) })
	}
}

fn unavailable(e: RedisError) -> StoreError {
	StoreError::Unavailable { message: e.to_string() }
}
