//! Thread-safe in-process [`CounterStore`] for single-instance deployments, tests, and fail-over.

// std
use std::sync::Weak;
// crates.io
use tokio::{runtime::Handle, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	clock::{self, SharedClock},
	obs,
	store::{CounterStore, StoreFuture, WindowSnapshot},
};

type WindowMap = Arc<Mutex<HashMap<String, Window>>>;

#[derive(Clone, Copy, Debug)]
struct Window {
	count: u64,
	reset_at: OffsetDateTime,
}
impl Window {
	fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.reset_at
	}
}

/// In-process counter store guarded by a single mutation point.
///
/// Expired windows count as zero on their next access whether or not the sweep has run; the sweep
/// only bounds memory. Not shared across processes.
#[derive(Clone, Debug)]
pub struct MemoryCounterStore {
	windows: WindowMap,
	clock: SharedClock,
	sweeper: Arc<Mutex<Option<SweepHandle>>>,
}
impl MemoryCounterStore {
	/// Default interval between background sweeps.
	pub const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

	/// Creates an empty store driven by the provided clock.
	pub fn new(clock: SharedClock) -> Self {
		Self { windows: Default::default(), clock, sweeper: Default::default() }
	}

	/// Starts a background sweep on the current tokio runtime.
	///
	/// Without a runtime the store keeps working and relies on lazy eviction alone.
	pub fn with_sweeper(self, interval: StdDuration) -> Self {
		match Handle::try_current() {
			Ok(runtime) => {
				let handle = SweepHandle::spawn(&runtime, &self.windows, self.clock.clone(), interval);

				*self.sweeper.lock() = Some(handle);
			},
			Err(_) => obs::log_sweeper_skipped(),
		}

		self
	}

	/// Number of windows currently held, including expired ones awaiting a sweep.
	pub fn len(&self) -> usize {
		self.windows.lock().len()
	}

	/// Returns `true` when no windows are held.
	pub fn is_empty(&self) -> bool {
		self.windows.lock().is_empty()
	}

	/// Runs one sweep pass and returns the number of removed windows.
	pub fn sweep(&self) -> usize {
		sweep_expired(&self.windows, self.clock.now())
	}

	fn increment_now(&self, key: &str, window: Duration) -> WindowSnapshot {
		let now = self.clock.now();
		let mut guard = self.windows.lock();
		let entry = guard
			.entry(key.to_owned())
			.and_modify(|current| {
				if current.is_expired_at(now) {
					*current = Window { count: 0, reset_at: now + window };
				}
			})
			.or_insert(Window { count: 0, reset_at: now + window });

		entry.count = entry.count.saturating_add(1);

		WindowSnapshot { count: entry.count, reset_at: entry.reset_at }
	}

	fn peek_now(&self, key: &str) -> u64 {
		let now = self.clock.now();

		self.windows
			.lock()
			.get(key)
			.filter(|window| !window.is_expired_at(now))
			.map_or(0, |window| window.count)
	}

	fn close_now(&self) {
		self.sweeper.lock().take();
		self.windows.lock().clear();
	}
}
impl Default for MemoryCounterStore {
	fn default() -> Self {
		Self::new(clock::system())
	}
}
impl CounterStore for MemoryCounterStore {
	fn increment_and_expire<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, WindowSnapshot> {
		let snapshot = self.increment_now(key, window);

		Box::pin(async move { Ok(snapshot) })
	}

	fn reset<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		self.windows.lock().remove(key);

		Box::pin(async { Ok(()) })
	}

	fn peek<'a>(&'a self, key: &'a str) -> StoreFuture<'a, u64> {
		let count = self.peek_now(key);

		Box::pin(async move { Ok(count) })
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		self.close_now();

		Box::pin(async { Ok(()) })
	}
}

/// Background sweep task; dropping the handle stops the sweep.
#[derive(Debug)]
pub struct SweepHandle(JoinHandle<()>);
impl SweepHandle {
	fn spawn(
		runtime: &Handle,
		windows: &WindowMap,
		clock: SharedClock,
		interval: StdDuration,
	) -> Self {
		let windows: Weak<Mutex<HashMap<String, Window>>> = Arc::downgrade(windows);
		let task = runtime.spawn(async move {
			let mut ticker = tokio::time::interval(interval);

			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				ticker.tick().await;

				let Some(windows) = windows.upgrade() else { break };
				let removed = sweep_expired(&windows, clock.now());

				obs::log_sweep(removed);
			}
		});

		Self(task)
	}

	/// Returns `true` once the sweep task has stopped.
	pub fn is_finished(&self) -> bool {
		self.0.is_finished()
	}
}
impl Drop for SweepHandle {
	fn drop(&mut self) {
		self.0.abort();
	}
}

// Snapshot the expired keys first, then delete each one only if it is still expired, so windows
// restarted between the two phases survive.
fn sweep_expired(windows: &Mutex<HashMap<String, Window>>, now: OffsetDateTime) -> usize {
	let expired: Vec<String> = windows
		.lock()
		.iter()
		.filter(|(_, window)| window.is_expired_at(now))
		.map(|(key, _)| key.clone())
		.collect();

	expired
		.into_iter()
		.filter(|key| {
			let mut guard = windows.lock();

			if guard.get(key).is_some_and(|window| window.is_expired_at(now)) {
				guard.remove(key);

				true
			} else {
				false
			}
		})
		.count()
}
