//! Security-event collaborator contracts and built-in sinks.
//!
//! Sinks are invoked after a decision is final and must return immediately: they may drop an
//! event, but they never block or fail the request that produced it.

// crates.io
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
// self
use crate::{_prelude::*, limit::RateLimitDecision, obs};

/// Fire-and-forget receiver of security events.
pub trait SecurityEventSink
where
	Self: Send + Sync,
{
	/// Hands the event to the sink without waiting for it to be processed.
	fn record(&self, event: SecurityEvent);
}

/// Categories of security events emitted by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
	/// A security-sensitive endpoint class denied a request over quota.
	RateLimitExceeded,
}
impl SecurityEventKind {
	/// Returns a stable label suitable for logs and audit records.
	pub const fn as_str(self) -> &'static str {
		match self {
			SecurityEventKind::RateLimitExceeded => "rate_limit_exceeded",
		}
	}
}

/// Audit record describing a security-relevant decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
	/// Event category.
	pub kind: SecurityEventKind,
	/// Endpoint-class namespace the decision belongs to.
	pub namespace: String,
	/// Caller identifier (address or user id) the decision was keyed on.
	pub identifier: String,
	/// Instant at which the offending window resets.
	#[serde(with = "time::serde::rfc3339")]
	pub reset_at: OffsetDateTime,
	/// Instant at which the decision was made.
	#[serde(with = "time::serde::rfc3339")]
	pub occurred_at: OffsetDateTime,
}
impl SecurityEvent {
	/// Builds a [`SecurityEventKind::RateLimitExceeded`] event from a denial.
	pub fn rate_limit_exceeded(decision: &RateLimitDecision, occurred_at: OffsetDateTime) -> Self {
		Self {
			kind: SecurityEventKind::RateLimitExceeded,
			namespace: decision.namespace.clone(),
			identifier: decision.identifier.clone(),
			reset_at: decision.reset_at,
			occurred_at,
		}
	}
}

/// Sink that writes every event to the `tracing` log at warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;
impl SecurityEventSink for TracingEventSink {
	fn record(&self, event: SecurityEvent) {
		obs::log_security_event(&event);
	}
}

/// Sink that forwards events to a bounded channel, dropping them when the consumer lags.
#[derive(Clone, Debug)]
pub struct ChannelEventSink(Sender<SecurityEvent>);
impl ChannelEventSink {
	/// Creates a sink plus the receiver a background consumer should drain.
	pub fn channel(capacity: usize) -> (Self, Receiver<SecurityEvent>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));

		(Self(tx), rx)
	}
}
impl SecurityEventSink for ChannelEventSink {
	fn record(&self, event: SecurityEvent) {
		match self.0.try_send(event) {
			Ok(()) => {},
			Err(TrySendError::Full(event) | TrySendError::Closed(event)) =>
				obs::log_security_event_dropped(&event),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn event(identifier: &str) -> SecurityEvent {
		SecurityEvent {
			kind: SecurityEventKind::RateLimitExceeded,
			namespace: "login".into(),
			identifier: identifier.into(),
			reset_at: macros::datetime!(2025-11-10 12:15 UTC),
			occurred_at: macros::datetime!(2025-11-10 12:00 UTC),
		}
	}

	#[tokio::test]
	async fn channel_sink_drops_when_full_without_blocking() {
		let (sink, mut rx) = ChannelEventSink::channel(1);

		sink.record(event("198.51.100.1"));
		sink.record(event("198.51.100.2"));

		let first = rx.recv().await.expect("The first event should be delivered.");

		assert_eq!(first.identifier, "198.51.100.1");
		assert!(rx.try_recv().is_err(), "The overflowing event should have been dropped.");
	}

	#[test]
	fn channel_sink_tolerates_closed_receiver() {
		let (sink, rx) = ChannelEventSink::channel(4);

		drop(rx);
		sink.record(event("198.51.100.3"));
	}

	#[test]
	fn event_serializes_with_snake_case_kind() {
		let payload =
			serde_json::to_value(event("198.51.100.4")).expect("Security event should serialize.");

		assert_eq!(payload["kind"], "rate_limit_exceeded");
		assert_eq!(payload["reset_at"], "2025-11-10T12:15:00Z");
	}
}
