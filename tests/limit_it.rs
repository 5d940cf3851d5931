#![cfg(feature = "test")]

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::Barrier;
// self
use tollgate::{
	_preludet::*,
	events::SecurityEventKind,
	limit::{EndpointClass, RateLimitRule, RateLimitTable, RateLimiter, RateLimiters},
	store::{CounterStore, MemoryCounterStore, StoreError, StoreFuture, WindowSnapshot},
};

fn login_limiter(clock: &ManualClock, events: Arc<RecordingEventSink>) -> RateLimiter {
	let store = Arc::new(MemoryCounterStore::new(clock.shared()));

	RateLimiter::for_class(EndpointClass::Login, EndpointClass::Login.default_rule(), store)
		.expect("Login limiter should build.")
		.with_clock(clock.shared())
		.with_events(events)
}

#[tokio::test]
async fn login_window_allows_five_then_denies() {
	let clock = ManualClock::new(fixed_instant());
	let events = Arc::new(RecordingEventSink::default());
	let limiter = login_limiter(&clock, events.clone());
	let mut remaining = Vec::new();

	for _ in 0..5 {
		let decision =
			limiter.check("203.0.113.7").await.expect("Login check should succeed.");

		assert!(decision.allowed);

		remaining.push(decision.remaining);
		clock.advance(Duration::seconds(1));
	}

	assert_eq!(remaining, [4, 3, 2, 1, 0]);
	assert!(events.events().is_empty());

	let denied = limiter.check("203.0.113.7").await.expect("Login check should succeed.");
	let retry_after = denied.retry_after_secs.expect("Denial should carry a retry hint.");

	assert!(!denied.allowed);
	assert_eq!(denied.remaining, 0);
	assert!(retry_after > 0 && retry_after <= 900);
	assert_eq!(denied.reset_at, fixed_instant() + Duration::minutes(15));
	assert_eq!(denied.namespace, "login");
	assert_eq!(denied.identifier, "203.0.113.7");

	let recorded = events.events();

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].kind, SecurityEventKind::RateLimitExceeded);
	assert_eq!(recorded[0].identifier, "203.0.113.7");
}

#[tokio::test]
async fn identifiers_do_not_share_windows() {
	let clock = ManualClock::new(fixed_instant());
	let limiter = login_limiter(&clock, Arc::new(RecordingEventSink::default()));

	for _ in 0..6 {
		limiter.check("203.0.113.7").await.expect("Login check should succeed.");
	}

	let other = limiter.check("198.51.100.1").await.expect("Login check should succeed.");

	assert!(other.allowed);
	assert_eq!(other.remaining, 4);
}

#[tokio::test]
async fn reset_restores_full_quota() {
	let clock = ManualClock::new(fixed_instant());
	let limiter = login_limiter(&clock, Arc::new(RecordingEventSink::default()));

	for _ in 0..7 {
		limiter.check("203.0.113.7").await.expect("Login check should succeed.");
	}

	limiter.reset("203.0.113.7").await.expect("Reset should succeed.");

	assert_eq!(limiter.count("203.0.113.7").await.expect("Count should succeed."), 0);

	let decision = limiter.check("203.0.113.7").await.expect("Login check should succeed.");

	assert!(decision.allowed);
	assert_eq!(decision.remaining, limiter.rule().max_requests - 1);
}

#[tokio::test]
async fn registry_routes_classes_to_distinct_windows() {
	let clock = ManualClock::new(fixed_instant());
	let events = Arc::new(RecordingEventSink::default());
	let store = Arc::new(MemoryCounterStore::new(clock.shared()));
	let table = RateLimitTable::default()
		.with_rule(EndpointClass::Api, RateLimitRule::new(1, 60_000))
		.expect("Override should be valid.");
	let limiters = RateLimiters::new(&table, store.clone(), clock.shared(), events.clone())
		.expect("Registry should build.");

	assert!(limiters.check(EndpointClass::Api, "user-1").await.expect("Check should succeed.").allowed);
	assert!(!limiters.check(EndpointClass::Api, "user-1").await.expect("Check should succeed.").allowed);
	assert!(limiters.check(EndpointClass::Search, "user-1").await.expect("Check should succeed.").allowed);
	assert_eq!(store.peek("ratelimit:api:user-1").await.expect("Peek should succeed."), 2);
	assert_eq!(store.peek("ratelimit:search:user-1").await.expect("Peek should succeed."), 1);
	// `api` is not security-sensitive.
	assert!(events.events().is_empty());
	assert_eq!(limiters.get(EndpointClass::Register).rule(), RateLimitRule::new(3, 3_600_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_checks_count_every_request() {
	const N: u64 = 64;

	let store = Arc::new(MemoryCounterStore::default());
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

	for task in tasks {
		let decision =
			task.await.expect("Check task should not panic.").expect("Check should succeed.");

		assert!(decision.allowed);
	}

	assert_eq!(limiter.count("burst").await.expect("Count should succeed."), N);
	assert!(!limiter.check("burst").await.expect("Check should succeed.").allowed);
}

/// Composes increment from a separate read and write, as a broken adapter would.
struct ReadThenWriteStore {
	count: AtomicU64,
	barrier: Barrier,
	reset_at: OffsetDateTime,
}
impl CounterStore for ReadThenWriteStore {
	fn increment_and_expire<'a>(
		&'a self,
		_key: &'a str,
		_window: Duration,
	) -> StoreFuture<'a, WindowSnapshot> {
		Box::pin(async move {
			let read = self.count.load(Ordering::SeqCst);

			// Every caller reads before any caller writes.
			self.barrier.wait().await;
			self.count.store(read + 1, Ordering::SeqCst);

			Ok(WindowSnapshot { count: read + 1, reset_at: self.reset_at })
		})
	}

	fn reset<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async { Ok(()) })
	}

	fn peek<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, u64> {
		Box::pin(async move { Ok(self.count.load(Ordering::SeqCst)) })
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Closed) })
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_then_write_composition_loses_updates() {
	const N: usize = 8;

	let store = Arc::new(ReadThenWriteStore {
		count: AtomicU64::new(0),
		barrier: Barrier::new(N),
		reset_at: fixed_instant(),
	});
	let limiter = Arc::new(
		RateLimiter::new("api", RateLimitRule::new(N as u64, 60_000), store.clone())
			.expect("Limiter should build."),
	);
	let tasks = (0..N)
		.map(|_| {
			let limiter = limiter.clone();

			tokio::spawn(async move { limiter.check("burst").await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		task.await.expect("Check task should not panic.").expect("Check should succeed.");
	}

	assert_eq!(limiter.count("burst").await.expect("Count should succeed."), 1);
}
