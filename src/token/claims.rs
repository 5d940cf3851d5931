//! Claim set carried by access and refresh tokens.

// self
use crate::{_prelude::*, auth::UserId};

/// Token class encoded in the `typ` claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
	/// Short-lived bearer credential.
	Access,
	/// Long-lived credential exchanged for a new pair.
	Refresh,
}
impl TokenType {
	/// Returns the claim value.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenType::Access => "access",
			TokenType::Refresh => "refresh",
		}
	}
}
impl Display for TokenType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Verified token payload.
///
/// Timestamps are Unix seconds. `auth_time` records the original authentication and survives
/// rotation; `iat` is reset on every issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject the token was issued to.
	#[serde(rename = "sub")]
	pub subject_id: UserId,
	/// Subject email at issuance.
	pub email: String,
	/// Token class.
	#[serde(rename = "typ")]
	pub token_type: TokenType,
	/// Issuer.
	pub iss: String,
	/// Issued-at instant.
	pub iat: i64,
	/// Expiry instant.
	pub exp: i64,
	/// Original authentication instant of the token chain.
	pub auth_time: i64,
	/// Whether the chain follows the remember-me refresh policy.
	#[serde(default)]
	pub remember: bool,
	/// Unique token identifier.
	pub jti: String,
}
impl TokenClaims {
	/// Issued-at instant.
	pub fn issued_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.iat).ok()
	}

	/// Expiry instant.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}

	/// Original authentication instant.
	pub fn authenticated_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.auth_time).ok()
	}

	/// Classifies `now` against the expiry and a grace window.
	pub fn grace_state(&self, now: OffsetDateTime, grace: Duration) -> GraceState {
		let Some(expires_at) = self.expires_at() else { return GraceState::Lapsed };

		if now < expires_at {
			return GraceState::Fresh;
		}

		let overdue = now - expires_at;

		if overdue < grace { GraceState::InGrace { overdue } } else { GraceState::Lapsed }
	}
}

/// Derived relation between `now`, the expiry, and a grace window; never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraceState {
	/// Not yet expired.
	Fresh,
	/// Expired, but by less than the grace window; callers should refresh immediately.
	InGrace {
		/// Time elapsed since expiry.
		overdue: Duration,
	},
	/// Expired beyond the grace window.
	Lapsed,
}
impl GraceState {
	/// Returns `true` unless the grace window has been exhausted.
	pub fn is_usable(self) -> bool {
		!matches!(self, GraceState::Lapsed)
	}
}
