//! Fail-over wrapper that keeps quotas enforced while the shared store is unreachable.
//!
//! Calls go to the primary store under a bounded timeout. When the primary errors or times out,
//! the call is answered by a local [`MemoryCounterStore`] and an outage episode begins. During an
//! outage the primary is probed at most once per probe interval; the first successful probe ends
//! the episode. Each episode is logged once when it starts and once when it ends.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	clock::SharedClock,
	obs,
	store::{CounterStore, MemoryCounterStore, StoreError, StoreFuture, WindowSnapshot},
};

/// Tuning knobs for [`FailoverCounterStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailoverConfig {
	/// Upper bound for a single primary-store call.
	pub timeout: StdDuration,
	/// Minimum spacing between primary probes while degraded.
	pub probe_interval: Duration,
}
impl FailoverConfig {
	/// Overrides the primary-call timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the probe interval; negative values are clamped to zero.
	pub fn with_probe_interval(mut self, interval: Duration) -> Self {
		self.probe_interval = if interval.is_negative() { Duration::ZERO } else { interval };

		self
	}
}
impl Default for FailoverConfig {
	fn default() -> Self {
		Self { timeout: StdDuration::from_millis(250), probe_interval: Duration::seconds(5) }
	}
}

#[derive(Clone, Copy, Debug)]
struct Outage {
	since: OffsetDateTime,
	next_probe: OffsetDateTime,
}

/// Counter store that degrades to a local store instead of failing callers.
pub struct FailoverCounterStore {
	primary: Arc<dyn CounterStore>,
	local: MemoryCounterStore,
	config: FailoverConfig,
	clock: SharedClock,
	outage: Mutex<Option<Outage>>,
	outages: AtomicU64,
}
impl FailoverCounterStore {
	/// Wraps `primary`, falling back to `local` during outages.
	pub fn new(
		primary: Arc<dyn CounterStore>,
		local: MemoryCounterStore,
		clock: SharedClock,
	) -> Self {
		Self {
			primary,
			local,
			config: FailoverConfig::default(),
			clock,
			outage: Mutex::new(None),
			outages: AtomicU64::new(0),
		}
	}

	/// Replaces the fail-over tuning.
	pub fn with_config(mut self, config: FailoverConfig) -> Self {
		self.config = config;

		self
	}

	/// Returns `true` while an outage episode is in progress.
	pub fn is_degraded(&self) -> bool {
		self.outage.lock().is_some()
	}

	/// Number of outage episodes observed since construction.
	pub fn outages(&self) -> u64 {
		self.outages.load(Ordering::Relaxed)
	}

	/// Local store answering calls during outages.
	pub fn local(&self) -> &MemoryCounterStore {
		&self.local
	}

	async fn route<'a, T, P, L>(&'a self, op: &'static str, primary: P, local: L) -> Result<T, StoreError>
	where
		P: FnOnce(&'a dyn CounterStore) -> StoreFuture<'a, T>,
		L: FnOnce(&'a MemoryCounterStore) -> StoreFuture<'a, T>,
	{
		if self.should_try_primary() {
			match tokio::time::timeout(self.config.timeout, primary(self.primary.as_ref())).await {
				Ok(Ok(value)) => {
					self.mark_healthy();

					return Ok(value);
				},
				Ok(Err(e)) => self.mark_degraded(op, &e),
				Err(_) => self.mark_degraded(op, &StoreError::Timeout {
					after_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
				}),
			}
		}

		local(&self.local).await
	}

	fn should_try_primary(&self) -> bool {
		let mut outage = self.outage.lock();
		let Some(state) = outage.as_mut() else { return true };
		let now = self.clock.now();

		if now < state.next_probe {
			return false;
		}

		// Claim the probe slot so concurrent callers keep using the local store.
		state.next_probe = now + self.config.probe_interval;

		true
	}

	fn mark_degraded(&self, op: &'static str, e: &StoreError) {
		let mut outage = self.outage.lock();

		if outage.is_none() {
			let now = self.clock.now();

			*outage = Some(Outage { since: now, next_probe: now + self.config.probe_interval });

			self.outages.fetch_add(1, Ordering::Relaxed);
			obs::log_store_outage(op, e);
		}
	}

	fn mark_healthy(&self) {
		if let Some(outage) = self.outage.lock().take() {
			obs::log_store_recovered(self.clock.now() - outage.since);
		}
	}
}
impl Debug for FailoverCounterStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FailoverCounterStore")
			.field("config", &self.config)
			.field("degraded", &self.is_degraded())
			.field("outages", &self.outages())
			.finish()
	}
}
impl CounterStore for FailoverCounterStore {
	fn increment_and_expire<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, WindowSnapshot> {
		Box::pin(self.route(
			"increment_and_expire",
			move |store| store.increment_and_expire(key, window),
			move |store| store.increment_and_expire(key, window),
		))
	}

	fn reset<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			// Clear both sides so a fail-over window cannot outlive an administrative reset.
			self.local.reset(key).await?;
			self.route("reset", move |store| store.reset(key), move |store| store.reset(key)).await
		})
	}

	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, u64> {
		Box::pin(self.route("peek", move |store| store.peek(key), move |store| store.peek(key)))
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let primary = self.primary.close().await;

			self.local.close().await?;

			primary
		})
	}
}
