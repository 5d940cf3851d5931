//! Optional observability helpers for quota checks, token verification, and identity resolution.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `tollgate.check` with the `check` (operation)
//!   and `stage` (call site) fields, plus events for store outages, denials, and rejected
//!   credentials.
//! - Enable `metrics` to increment the `tollgate_check_total` counter for every
//!   attempt/pass/reject/error, labeled by `check` + `outcome`.
//!
//! # Levels
//!
//! `tollgate.check` spans open at `DEBUG`, so a default `INFO` subscriber sees only events. Store
//! outages, identity lookup failures, and security events log at `WARN`; store recovery and quota
//! denials at `INFO`; token rejections and sweeper notices at `DEBUG`; sweep passes at `TRACE`. A
//! failed signing during rotation is the only `ERROR`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Operations observed by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckKind {
	/// Fixed-window quota check.
	RateLimit,
	/// Access-token verification.
	VerifyAccess,
	/// Refresh-token verification.
	VerifyRefresh,
	/// Refresh-token rotation.
	Refresh,
	/// Request identity resolution.
	Resolve,
}
impl CheckKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CheckKind::RateLimit => "rate_limit",
			CheckKind::VerifyAccess => "verify_access",
			CheckKind::VerifyRefresh => "verify_refresh",
			CheckKind::Refresh => "refresh",
			CheckKind::Resolve => "resolve",
		}
	}
}
impl Display for CheckKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckOutcome {
	/// Entry to a check.
	Attempt,
	/// The request or credential was accepted.
	Pass,
	/// The request or credential was refused.
	Reject,
	/// The check could not be completed.
	Error,
}
impl CheckOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CheckOutcome::Attempt => "attempt",
			CheckOutcome::Pass => "pass",
			CheckOutcome::Reject => "reject",
			CheckOutcome::Error => "error",
		}
	}
}
impl Display for CheckOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
