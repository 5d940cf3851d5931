//! Fixed-window quota enforcement per endpoint class.
//!
//! Each check performs one atomic `increment_and_expire` on the configured [`CounterStore`] and
//! allows the request while the post-increment count stays within the rule. This is a fixed
//! window, not a sliding log: a burst straddling a window boundary can land up to twice
//! `max_requests` requests inside one window length. In exchange every check costs O(1) time and
//! memory per key.

pub mod class;
pub mod decision;

pub use class::*;
pub use decision::*;

// self
use crate::{
	_prelude::*,
	clock::{self, SharedClock},
	events::{SecurityEvent, SecurityEventSink, TracingEventSink},
	obs::{self, CheckKind, CheckOutcome, CheckSpan},
	store::CounterStore,
};

const KEY_PREFIX: &str = "ratelimit";

/// Quota enforcer for one namespace.
///
/// Holds only static configuration plus shared handles; all window state lives in the store.
#[derive(Clone)]
pub struct RateLimiter {
	namespace: String,
	rule: RateLimitRule,
	security_sensitive: bool,
	store: Arc<dyn CounterStore>,
	clock: SharedClock,
	events: Arc<dyn SecurityEventSink>,
}
impl RateLimiter {
	/// Creates a limiter for `namespace`.
	///
	/// A namespace naming a built-in [`EndpointClass`] inherits that class's security
	/// sensitivity, so `new("login", ..)` reports denials like [`RateLimiter::for_class`] does.
	pub fn new(
		namespace: impl Into<String>,
		rule: RateLimitRule,
		store: Arc<dyn CounterStore>,
	) -> Result<Self> {
		let namespace = namespace.into();

		rule.validate(&namespace)?;

		let security_sensitive =
			namespace.parse::<EndpointClass>().is_ok_and(EndpointClass::is_security_sensitive);

		Ok(Self {
			namespace,
			rule,
			security_sensitive,
			store,
			clock: clock::system(),
			events: Arc::new(TracingEventSink),
		})
	}

	/// Creates a limiter for a built-in endpoint class.
	pub fn for_class(
		class: EndpointClass,
		rule: RateLimitRule,
		store: Arc<dyn CounterStore>,
	) -> Result<Self> {
		Self::new(class.as_str(), rule, store)
	}

	/// Replaces the clock used to compute retry hints.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the security-event sink.
	pub fn with_events(mut self, events: Arc<dyn SecurityEventSink>) -> Self {
		self.events = events;

		self
	}

	/// Marks denials as security events (or stops doing so).
	pub fn with_security_sensitive(mut self, sensitive: bool) -> Self {
		self.security_sensitive = sensitive;

		self
	}

	/// Namespace owned by this limiter.
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Quota enforced by this limiter.
	pub fn rule(&self) -> RateLimitRule {
		self.rule
	}

	/// Store key for a caller identifier.
	pub fn key(&self, identifier: &str) -> String {
		format!("{KEY_PREFIX}:{}:{identifier}", self.namespace)
	}

	/// Counts the request against the identifier's window and decides whether it may proceed.
	pub async fn check(&self, identifier: &str) -> Result<RateLimitDecision> {
		const KIND: CheckKind = CheckKind::RateLimit;

		let span = CheckSpan::new(KIND, "check");

		obs::record_check_outcome(KIND, CheckOutcome::Attempt);

		let result: Result<RateLimitDecision> = span
			.instrument(async move {
				let key = self.key(identifier);
				let window = self.store.increment_and_expire(&key, self.rule.window()).await?;
				let now = self.clock.now();

				Ok(RateLimitDecision::evaluate(&self.namespace, identifier, &self.rule, window, now))
			})
			.await;

		match &result {
			Ok(decision) if decision.allowed => obs::record_check_outcome(KIND, CheckOutcome::Pass),
			Ok(decision) => {
				obs::record_check_outcome(KIND, CheckOutcome::Reject);
				obs::log_rate_limited(decision);

				if self.security_sensitive {
					self.events.record(SecurityEvent::rate_limit_exceeded(decision, self.clock.now()));
				}
			},
			Err(_) => obs::record_check_outcome(KIND, CheckOutcome::Error),
		}

		result
	}

	/// Clears the identifier's window immediately.
	pub async fn reset(&self, identifier: &str) -> Result<()> {
		self.store.reset(&self.key(identifier)).await?;

		Ok(())
	}

	/// Reads the identifier's current count without consuming quota.
	pub async fn count(&self, identifier: &str) -> Result<u64> {
		Ok(self.store.peek(&self.key(identifier)).await?)
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("namespace", &self.namespace)
			.field("rule", &self.rule)
			.field("security_sensitive", &self.security_sensitive)
			.finish()
	}
}

/// One limiter per [`EndpointClass`], all sharing one counter store.
#[derive(Clone, Debug)]
pub struct RateLimiters(Vec<RateLimiter>);
impl RateLimiters {
	/// Builds limiters for every class in the table.
	pub fn new(
		table: &RateLimitTable,
		store: Arc<dyn CounterStore>,
		clock: SharedClock,
		events: Arc<dyn SecurityEventSink>,
	) -> Result<Self> {
		EndpointClass::ALL
			.into_iter()
			.map(|class| {
				Ok(RateLimiter::for_class(class, table.rule(class), store.clone())?
					.with_clock(clock.clone())
					.with_events(events.clone()))
			})
			.collect::<Result<Vec<_>>>()
			.map(Self)
	}

	/// Limiter responsible for `class`.
	pub fn get(&self, class: EndpointClass) -> &RateLimiter {
		&self.0[class.index()]
	}

	/// Shorthand for `self.get(class).check(identifier)`.
	pub async fn check(&self, class: EndpointClass, identifier: &str) -> Result<RateLimitDecision> {
		self.get(class).check(identifier).await
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{_preludet::RecordingEventSink, clock::ManualClock, store::MemoryCounterStore};

	fn limiter(rule: RateLimitRule) -> (RateLimiter, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-11-10 12:00 UTC));
		let store = Arc::new(MemoryCounterStore::new(clock.shared()));
		let limiter = RateLimiter::new("api", rule, store)
			.expect("Limiter fixture should be valid.")
			.with_clock(clock.shared());

		(limiter, clock)
	}

	#[test]
	fn keys_are_namespaced() {
		let (limiter, _) = limiter(RateLimitRule::new(1, 1_000));

		assert_eq!(limiter.key("user-1"), "ratelimit:api:user-1");
	}

	#[test]
	fn zero_quota_is_a_configuration_error() {
		let result = RateLimiter::new(
			"api",
			RateLimitRule::new(0, 1_000),
			Arc::new(MemoryCounterStore::default()),
		);

		assert!(matches!(result, Err(Error::Config(_))));
	}

	#[tokio::test]
	async fn new_window_starts_after_reset_instant() {
		let (limiter, clock) = limiter(RateLimitRule::new(2, 60_000));

		for _ in 0..3 {
			limiter.check("user-1").await.expect("Check should succeed.");
		}

		assert_eq!(limiter.count("user-1").await.expect("Count should succeed."), 3);

		clock.advance(Duration::minutes(1));

		let fresh = limiter.check("user-1").await.expect("Check should succeed.");

		assert!(fresh.allowed);
		assert_eq!(fresh.remaining, 1);
		assert_eq!(fresh.reset_at, macros::datetime!(2025-11-10 12:02 UTC));
	}

	#[tokio::test]
	async fn count_does_not_consume_quota() {
		let (limiter, _) = limiter(RateLimitRule::new(2, 60_000));

		limiter.check("user-1").await.expect("Check should succeed.");

		for _ in 0..5 {
			assert_eq!(limiter.count("user-1").await.expect("Count should succeed."), 1);
		}

		assert_eq!(limiter.check("user-1").await.expect("Check should succeed.").remaining, 0);
	}

	#[tokio::test]
	async fn class_namespaces_inherit_security_sensitivity() {
		let store = Arc::new(MemoryCounterStore::default());
		let events = Arc::new(RecordingEventSink::default());
		let login = RateLimiter::new("login", RateLimitRule::new(1, 60_000), store.clone())
			.expect("Limiter fixture should be valid.")
			.with_events(events.clone());
		let custom = RateLimiter::new("login_v2", RateLimitRule::new(1, 60_000), store)
			.expect("Limiter fixture should be valid.")
			.with_events(events.clone());

		for limiter in [&login, &custom] {
			for _ in 0..2 {
				limiter.check("203.0.113.7").await.expect("Check should succeed.");
			}
		}

		let namespaces: Vec<_> = events.events().into_iter().map(|event| event.namespace).collect();

		assert_eq!(namespaces, ["login"]);
	}
}
