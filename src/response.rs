//! HTTP projections of quota denials and authentication failures.
//!
//! Bodies are JSON documents: `{"error", "retryAfter"}` for 429 and `{"error"}` for 401. Neither
//! reveals why a credential was refused.

// crates.io
use http::{
	HeaderName, HeaderValue, Response, StatusCode,
	header::{CONTENT_TYPE, WWW_AUTHENTICATE},
};
use serde_json::json;
// self
use crate::limit::RateLimitDecision;

/// Quota applied to the caller's window.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests still allowed in the caller's window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Unix time (seconds) at which the caller's window resets.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Builds the 429 response for a denied decision, including every rate-limit header.
pub fn too_many_requests(decision: &RateLimitDecision) -> Response<String> {
	let body = json!({
		"error": "Too many requests. Please try again later.",
		"retryAfter": decision.retry_after_secs.unwrap_or(1),
	});
	let mut response = json_response(StatusCode::TOO_MANY_REQUESTS, body);

	decision.apply_headers(response.headers_mut());

	response
}

/// Builds the uniform 401 response for any authentication failure.
pub fn unauthorized() -> Response<String> {
	let mut response =
		json_response(StatusCode::UNAUTHORIZED, json!({ "error": "Authentication required." }));

	response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

	response
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<String> {
	let mut response = Response::new(body.to_string());

	*response.status_mut() = status;
	response.headers_mut().insert(CONTENT_TYPE, JSON);

	response
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::RETRY_AFTER;
	use time::macros;
	// self
	use super::*;
	use crate::{limit::RateLimitRule, store::WindowSnapshot};

	#[test]
	fn denial_renders_429_with_retry_hint() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let decision = RateLimitDecision::evaluate(
			"login",
			"203.0.113.7",
			&RateLimitRule::new(5, 900_000),
			WindowSnapshot { count: 6, reset_at: now + time::Duration::seconds(42) },
			now,
		);
		let response = too_many_requests(&decision);
		let body: serde_json::Value =
			serde_json::from_str(response.body()).expect("Body should be valid JSON.");

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers()[RETRY_AFTER], "42");
		assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
		assert_eq!(body["retryAfter"], 42);
		assert!(body["error"].is_string());
	}

	#[test]
	fn unauthorized_is_uniform() {
		let response = unauthorized();
		let body: serde_json::Value =
			serde_json::from_str(response.body()).expect("Body should be valid JSON.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
		assert_eq!(body, json!({ "error": "Authentication required." }));
	}
}
