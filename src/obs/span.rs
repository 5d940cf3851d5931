// self
use crate::{
	_prelude::*,
	auth::{IdentitySource, LookupError},
	events::SecurityEvent,
	limit::RateLimitDecision,
	obs::CheckKind,
	store::StoreError,
	token::{TokenRejection, TokenType},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCheck<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCheck<F> = F;

/// A span builder used by checks.
#[derive(Clone, Debug)]
pub struct CheckSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CheckSpan {
	/// Creates a new span tagged with the provided check kind + stage.
	pub fn new(kind: CheckKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!("tollgate.check", check = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> CheckSpanGuard {
		#[cfg(feature = "tracing")]
		{
			CheckSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			CheckSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCheck<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`CheckSpan::entered`].
pub struct CheckSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for CheckSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CheckSpanGuard(..)")
	}
}

/// Logs the start of a shared-store outage episode.
pub fn log_store_outage(op: &'static str, error: &StoreError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(op, %error, "shared counter store unavailable; serving quotas from the local store");
	#[cfg(not(feature = "tracing"))]
	let _ = (op, error);
}

/// Logs the end of a shared-store outage episode.
pub fn log_store_recovered(outage: Duration) {
	#[cfg(feature = "tracing")]
	tracing::info!(outage_ms = outage.whole_milliseconds() as i64, "shared counter store recovered");
	#[cfg(not(feature = "tracing"))]
	let _ = outage;
}

/// Logs one background sweep pass.
pub fn log_sweep(removed: usize) {
	#[cfg(feature = "tracing")]
	tracing::trace!(removed, "swept expired quota windows");
	#[cfg(not(feature = "tracing"))]
	let _ = removed;
}

/// Logs that no runtime was available to host the sweep task.
pub fn log_sweeper_skipped() {
	#[cfg(feature = "tracing")]
	tracing::debug!("no tokio runtime available; quota windows rely on lazy eviction only");
}

/// Logs a quota denial with its audit context.
pub fn log_rate_limited(decision: &RateLimitDecision) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		namespace = %decision.namespace,
		identifier = %decision.identifier,
		count = decision.count,
		limit = decision.limit,
		reset_at = %decision.reset_at,
		"quota exceeded"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = decision;
}

/// Logs why a token was rejected; the reason never leaves the process.
pub fn log_token_rejected(expected: TokenType, rejection: &TokenRejection, fingerprint: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(expected = expected.as_str(), %rejection, fingerprint, "token rejected");
	#[cfg(not(feature = "tracing"))]
	let _ = (expected, rejection, fingerprint);
}

/// Logs a signing failure that prevented a rotation.
pub fn log_signing_failure(error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(%error, "token pair could not be issued");
	#[cfg(not(feature = "tracing"))]
	let _ = error;
}

/// Logs a collaborator lookup failure during identity resolution.
pub fn log_lookup_failure(source: IdentitySource, error: &LookupError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(source = source.as_str(), %error, "identity lookup failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (source, error);
}

/// Writes a security event to the log.
pub fn log_security_event(event: &SecurityEvent) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		kind = event.kind.as_str(),
		namespace = %event.namespace,
		identifier = %event.identifier,
		reset_at = %event.reset_at,
		"security event"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = event;
}

/// Logs a security event dropped because its sink was saturated or closed.
pub fn log_security_event_dropped(event: &SecurityEvent) {
	#[cfg(feature = "tracing")]
	tracing::warn!(kind = event.kind.as_str(), "security event dropped");
	#[cfg(not(feature = "tracing"))]
	let _ = event;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn check_span_noop_without_tracing() {
		let _guard = CheckSpan::new(CheckKind::VerifyAccess, "test").entered();
		// Compile-time smoke test ensures the guard exists even when tracing is disabled.
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CheckSpan::new(CheckKind::RateLimit, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
