#![cfg(feature = "test")]

// std
use std::{
	future,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use tollgate::{
	_preludet::*,
	clock,
	limit::{RateLimitRule, RateLimiter},
	store::{
		CounterStore, FailoverConfig, FailoverCounterStore, MemoryCounterStore, StoreFuture,
		WindowSnapshot,
	},
};

/// Primary whose calls never complete, like a server that accepts but never answers.
#[derive(Default)]
struct HangingStore {
	calls: AtomicU64,
}
impl HangingStore {
	fn hang<'a, T>(&'a self) -> StoreFuture<'a, T>
	where
		T: 'a + Send,
	{
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(future::pending())
	}
}
impl CounterStore for HangingStore {
	fn increment_and_expire<'a>(
		&'a self,
		_key: &'a str,
		_window: Duration,
	) -> StoreFuture<'a, WindowSnapshot> {
		self.hang()
	}

	fn reset<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
		self.hang()
	}

	fn peek<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, u64> {
		self.hang()
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

fn degraded_limiter(
	clock: &ManualClock,
) -> (RateLimiter, Arc<FailoverCounterStore>, Arc<HangingStore>) {
	let primary = Arc::new(HangingStore::default());
	let store = Arc::new(
		FailoverCounterStore::new(
			primary.clone(),
			MemoryCounterStore::new(clock.shared()),
			clock.shared(),
		)
		.with_config(FailoverConfig::default().with_timeout(StdDuration::from_millis(20))),
	);
	let limiter = RateLimiter::new("login", RateLimitRule::new(2, 60_000), store.clone())
		.expect("Limiter should build.")
		.with_clock(clock.shared());

	(limiter, store, primary)
}

#[tokio::test]
async fn quotas_stay_enforced_when_the_shared_store_hangs() {
	let clock = ManualClock::new(fixed_instant());
	let (limiter, store, primary) = degraded_limiter(&clock);
	let mut allowed = Vec::new();

	for _ in 0..3 {
		allowed.push(limiter.check("203.0.113.7").await.expect("Check should fail over.").allowed);
	}

	assert_eq!(allowed, [true, true, false]);
	assert!(store.is_degraded());
	assert_eq!(store.outages(), 1);
	// Only the first call waited on the primary; the rest went straight to the local store.
	assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hanging_primary_is_reprobed_once_per_interval() {
	let clock = ManualClock::new(fixed_instant());
	let (limiter, store, primary) = degraded_limiter(&clock);

	limiter.check("user-1").await.expect("Check should fail over.");
	clock.advance(Duration::seconds(5));

	for _ in 0..3 {
		limiter.check("user-1").await.expect("Check should fail over.");
	}

	assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
	assert_eq!(store.outages(), 1, "A failed probe continues the same outage episode.");
	assert_eq!(store.local().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn healthy_primary_counts_every_parallel_check() {
	const N: u64 = 200;

	let primary = Arc::new(MemoryCounterStore::default());
	let store = Arc::new(FailoverCounterStore::new(
		primary.clone(),
		MemoryCounterStore::default(),
		clock::system(),
	));
	let limiter = Arc::new(
		RateLimiter::new("api", RateLimitRule::new(N, 60_000), store.clone())
			.expect("Limiter should build."),
	);
	let tasks = (0..N)
		.map(|_| {
			let limiter = limiter.clone();

			tokio::spawn(async move { limiter.check("burst").await })
		})
		.collect::<Vec<_>>();
	let mut allowed = 0;

	for task in tasks {
		let decision =
			task.await.expect("Check task should not panic.").expect("Check should succeed.");

		if decision.allowed {
			allowed += 1;
		}
	}

	assert_eq!(allowed, N);
	assert_eq!(primary.peek(&limiter.key("burst")).await.expect("Peek should succeed."), N);
	assert!(!limiter.check("burst").await.expect("Check should succeed.").allowed);
	assert!(!store.is_degraded());
	assert!(store.local().is_empty());
}
