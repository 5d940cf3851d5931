//! Outcome of one quota check plus its HTTP header projection.

// crates.io
use http::{HeaderMap, HeaderValue, header::RETRY_AFTER};
// self
use crate::{
	_prelude::*,
	limit::RateLimitRule,
	response::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET},
	store::WindowSnapshot,
};

/// Result of [`RateLimiter::check`](crate::limit::RateLimiter::check).
///
/// Carries the namespace, identifier, and reset instant so every decision can be audited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
	/// Whether the request may proceed.
	pub allowed: bool,
	/// Namespace (endpoint class) the decision belongs to.
	pub namespace: String,
	/// Caller identifier the window is keyed on.
	pub identifier: String,
	/// Requests allowed inside one window.
	pub limit: u64,
	/// Requests counted in the active window, including this one.
	pub count: u64,
	/// Requests still allowed in the active window.
	pub remaining: u64,
	/// Instant at which the window resets.
	#[serde(with = "time::serde::rfc3339")]
	pub reset_at: OffsetDateTime,
	/// Whole seconds to wait before retrying; present only on denial and always positive.
	pub retry_after_secs: Option<u64>,
}
impl RateLimitDecision {
	/// Applies the fixed-window rule to a post-increment snapshot.
	pub fn evaluate(
		namespace: &str,
		identifier: &str,
		rule: &RateLimitRule,
		window: WindowSnapshot,
		now: OffsetDateTime,
	) -> Self {
		let allowed = window.count <= rule.max_requests;
		let retry_after_secs = (!allowed).then(|| {
			let wait_ms = (window.reset_at - now).whole_milliseconds().max(0);
			let wait_secs = u64::try_from((wait_ms + 999) / 1_000).unwrap_or(u64::MAX);

			wait_secs.max(1)
		});

		Self {
			allowed,
			namespace: namespace.to_owned(),
			identifier: identifier.to_owned(),
			limit: rule.max_requests,
			count: window.count,
			remaining: rule.max_requests.saturating_sub(window.count),
			reset_at: window.reset_at,
			retry_after_secs,
		}
	}

	/// Returns `true` when the request may proceed.
	pub fn is_allowed(&self) -> bool {
		self.allowed
	}

	/// Wait before retrying, when denied.
	pub fn retry_after(&self) -> Option<Duration> {
		self.retry_after_secs.map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
	}

	/// Builds the `X-RateLimit-*` headers, plus `Retry-After` when denied.
	pub fn headers(&self) -> HeaderMap {
		let mut headers = HeaderMap::with_capacity(4);

		self.apply_headers(&mut headers);

		headers
	}

	/// Writes the rate-limit headers into an existing header map.
	pub fn apply_headers(&self, headers: &mut HeaderMap) {
		headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
		headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
		headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at.unix_timestamp()));

		match self.retry_after_secs {
			Some(secs) => {
				headers.insert(RETRY_AFTER, HeaderValue::from(secs));
			},
			None => {
				headers.remove(RETRY_AFTER);
			},
		}
	}
}
