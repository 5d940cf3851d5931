//! Signed access/refresh token pairs with bounded validity and grace.
//!
//! Access and refresh tokens are HS256 JWTs signed with two distinct secrets, so a token of one
//! class never verifies as the other even before the `typ` claim is inspected. Verification is
//! pure computation against the injected [`Clock`](crate::clock::Clock); every failure is logged
//! with a fingerprint of the offending token and surfaces as `None`.
//!
//! Rotation does not revoke the superseded refresh token server-side: it stays usable until its
//! own expiry.

pub mod claims;
pub mod config;
pub mod secret;

pub use claims::*;
pub use config::*;
pub use secret::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::Error as JwtError,
	errors::ErrorKind,
};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	clock::{self, SharedClock},
	obs::{self, CheckKind, CheckOutcome, CheckSpan},
};

const ALGORITHM: Algorithm = Algorithm::HS256;
const JTI_BYTES: usize = 16;
/// Tolerated distance between a token's `iat` and the verifier's clock.
const MAX_ISSUED_AT_SKEW: Duration = Duration::seconds(60);

/// Freshly issued access/refresh pair.
#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Long-lived credential exchanged for the next pair.
	pub refresh_token: TokenSecret,
	/// Access-token lifetime in whole seconds.
	pub expires_in: u64,
}

/// Reason a presented token was refused.
///
/// Only ever logged; public verification entry points collapse it to `None`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenRejection {
	/// The token is not a well-formed JWT carrying this service's claims.
	#[error("Token is malformed.")]
	Malformed,
	/// The signature does not match the class secret.
	#[error("Token signature is invalid.")]
	Signature,
	/// The header names an algorithm other than HS256.
	#[error("Token algorithm is not accepted.")]
	Algorithm,
	/// The token was issued by someone else.
	#[error("Token issuer is not accepted.")]
	Issuer,
	/// A mandatory registered claim is absent.
	#[error("Token is missing the `{claim}` claim.")]
	MissingClaim {
		/// Claim name.
		claim: String,
	},
	/// The `typ` claim names the other token class.
	#[error("Expected a {expected} token but found a {found} token.")]
	WrongType {
		/// Class the caller asked for.
		expected: TokenType,
		/// Class carried by the token.
		found: TokenType,
	},
	/// The token expired beyond any applicable grace window.
	#[error("Token has expired.")]
	Expired,
	/// The token claims an issuance instant in the future.
	#[error("Token was issued in the future.")]
	IssuedInFuture,
	/// A remember-me refresh was attempted with a token outside a remember-me chain.
	#[error("Token does not belong to a remember-me session.")]
	NotRemembered,
	/// The chain's original authentication is older than the remember-me ceiling.
	#[error("Session is older than the remember-me ceiling.")]
	TooOld,
}
impl From<JwtError> for TokenRejection {
	fn from(error: JwtError) -> Self {
		match error.kind() {
			ErrorKind::InvalidSignature => TokenRejection::Signature,
			ErrorKind::InvalidAlgorithm => TokenRejection::Algorithm,
			ErrorKind::InvalidIssuer => TokenRejection::Issuer,
			ErrorKind::MissingRequiredClaim(claim) =>
				TokenRejection::MissingClaim { claim: claim.clone() },
			_ => TokenRejection::Malformed,
		}
	}
}

#[derive(Clone)]
struct ClassKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
}
impl ClassKeys {
	fn new(secret: &TokenSecret) -> Self {
		let bytes = secret.expose().as_bytes();

		Self { encoding: EncodingKey::from_secret(bytes), decoding: DecodingKey::from_secret(bytes) }
	}
}

/// Issues, verifies, and rotates token pairs.
#[derive(Clone)]
pub struct TokenService {
	config: TokenConfig,
	access: ClassKeys,
	refresh: ClassKeys,
	validation: Validation,
	clock: SharedClock,
}
impl TokenService {
	/// Creates a service from a validated configuration using the system clock.
	pub fn new(config: TokenConfig) -> Self {
		let mut validation = Validation::new(ALGORITHM);

		// Expiry is judged against the injected clock with per-class grace.
		validation.validate_exp = false;
		validation.leeway = 0;
		validation.set_required_spec_claims(&["exp", "sub", "iss"]);
		validation.set_issuer(&[config.issuer.as_str()]);

		Self {
			access: ClassKeys::new(&config.access_secret),
			refresh: ClassKeys::new(&config.refresh_secret),
			validation,
			clock: clock::system(),
			config,
		}
	}

	/// Replaces the clock used for issuance and expiry checks.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &TokenConfig {
		&self.config
	}

	/// Issues a standard pair for a freshly authenticated subject.
	pub fn issue_pair(&self, subject_id: &UserId, email: &str) -> Result<TokenPair> {
		self.issue_pair_with(subject_id, email, false)
	}

	/// Issues a pair, optionally starting a remember-me chain with the longer refresh lifetime.
	pub fn issue_pair_with(
		&self,
		subject_id: &UserId,
		email: &str,
		remember: bool,
	) -> Result<TokenPair> {
		let now = self.clock.now();

		self.issue_chain(subject_id, email, now, now.unix_timestamp(), remember)
	}

	/// Returns the claims of a usable access token, honoring the expiry grace window.
	pub fn verify_access(&self, token: &str) -> Option<TokenClaims> {
		const KIND: CheckKind = CheckKind::VerifyAccess;

		let _span = CheckSpan::new(KIND, "verify_access").entered();

		obs::record_check_outcome(KIND, CheckOutcome::Attempt);

		settle(KIND, TokenType::Access, token, self.check_access(token))
	}

	/// Returns the claims of an unexpired refresh token; no grace applies.
	pub fn verify_refresh(&self, token: &str) -> Option<TokenClaims> {
		const KIND: CheckKind = CheckKind::VerifyRefresh;

		let _span = CheckSpan::new(KIND, "verify_refresh").entered();

		obs::record_check_outcome(KIND, CheckOutcome::Attempt);

		settle(KIND, TokenType::Refresh, token, self.check_refresh(token))
	}

	/// Exchanges a valid refresh token for a brand-new pair.
	///
	/// The new pair keeps the chain's original `auth_time` and remember-me flag. `iat` has
	/// whole-second resolution, so it only increases once the clock has moved to a later second;
	/// pairs minted within one second are told apart by their random `jti`.
	pub fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
		let _span = CheckSpan::new(CheckKind::Refresh, "refresh").entered();

		self.rotate(refresh_token, |service| service.check_refresh(refresh_token))
	}

	/// Exchanges a remember-me refresh token, accepting it shortly after expiry.
	///
	/// Succeeds while the token is unexpired or expired within the remember-me grace, and the
	/// chain's original authentication is within the remember-me ceiling.
	pub fn refresh_remembered(&self, refresh_token: &str) -> Option<TokenPair> {
		let _span = CheckSpan::new(CheckKind::Refresh, "refresh_remembered").entered();

		self.rotate(refresh_token, |service| service.check_remembered(refresh_token))
	}

	/// Whether `claims` may still rotate under the remember-me policy at `now`.
	pub fn is_remember_eligible(&self, claims: &TokenClaims, now: OffsetDateTime) -> bool {
		claims.remember
			&& claims.grace_state(now, self.config.remember.expired_grace).is_usable()
			&& self.within_ceiling(claims, now)
	}

	/// Verifies an access token and explains any rejection.
	pub fn check_access(&self, token: &str) -> Result<TokenClaims, TokenRejection> {
		let now = self.clock.now();
		let claims = self.decode(token, TokenType::Access, now)?;

		if !claims.grace_state(now, self.config.access_grace).is_usable() {
			return Err(TokenRejection::Expired);
		}

		Ok(claims)
	}

	/// Verifies a refresh token and explains any rejection.
	pub fn check_refresh(&self, token: &str) -> Result<TokenClaims, TokenRejection> {
		let now = self.clock.now();
		let claims = self.decode(token, TokenType::Refresh, now)?;

		if !claims.grace_state(now, Duration::ZERO).is_usable() {
			return Err(TokenRejection::Expired);
		}
		if claims.remember && !self.within_ceiling(&claims, now) {
			return Err(TokenRejection::TooOld);
		}

		Ok(claims)
	}

	/// Verifies a remember-me refresh token and explains any rejection.
	pub fn check_remembered(&self, token: &str) -> Result<TokenClaims, TokenRejection> {
		let now = self.clock.now();
		let claims = self.decode(token, TokenType::Refresh, now)?;

		if !claims.remember {
			return Err(TokenRejection::NotRemembered);
		}
		if !self.within_ceiling(&claims, now) {
			return Err(TokenRejection::TooOld);
		}
		if !claims.grace_state(now, self.config.remember.expired_grace).is_usable() {
			return Err(TokenRejection::Expired);
		}

		Ok(claims)
	}

	fn rotate<F>(&self, refresh_token: &str, check: F) -> Option<TokenPair>
	where
		F: FnOnce(&Self) -> Result<TokenClaims, TokenRejection>,
	{
		const KIND: CheckKind = CheckKind::Refresh;

		obs::record_check_outcome(KIND, CheckOutcome::Attempt);

		let claims = match check(self) {
			Ok(claims) => claims,
			Err(rejection) => return settle(KIND, TokenType::Refresh, refresh_token, Err(rejection)),
		};
		let now = self.clock.now();

		match self.issue_chain(&claims.subject_id, &claims.email, now, claims.auth_time, claims.remember)
		{
			Ok(pair) => {
				obs::record_check_outcome(KIND, CheckOutcome::Pass);

				Some(pair)
			},
			Err(error) => {
				obs::record_check_outcome(KIND, CheckOutcome::Error);
				obs::log_signing_failure(&error);

				None
			},
		}
	}

	fn issue_chain(
		&self,
		subject_id: &UserId,
		email: &str,
		now: OffsetDateTime,
		auth_time: i64,
		remember: bool,
	) -> Result<TokenPair> {
		let refresh_ttl =
			if remember { self.config.remember.refresh_ttl } else { self.config.refresh_ttl };
		let mint = |token_type, ttl: Duration| {
			let claims = TokenClaims {
				subject_id: subject_id.clone(),
				email: email.to_owned(),
				token_type,
				iss: self.config.issuer.clone(),
				iat: now.unix_timestamp(),
				exp: (now + ttl).unix_timestamp(),
				auth_time,
				remember,
				jti: new_jti(),
			};

			self.sign(&claims)
		};

		Ok(TokenPair {
			access_token: mint(TokenType::Access, self.config.access_ttl)?,
			refresh_token: mint(TokenType::Refresh, refresh_ttl)?,
			expires_in: u64::try_from(self.config.access_ttl.whole_seconds()).unwrap_or_default(),
		})
	}

	fn sign(&self, claims: &TokenClaims) -> Result<TokenSecret> {
		let keys = self.keys(claims.token_type);

		jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &keys.encoding)
			.map(TokenSecret::new)
			.map_err(|source| Error::Signing { source })
	}

	fn decode(
		&self,
		token: &str,
		expected: TokenType,
		now: OffsetDateTime,
	) -> Result<TokenClaims, TokenRejection> {
		let claims =
			jsonwebtoken::decode::<TokenClaims>(token, &self.keys(expected).decoding, &self.validation)?
				.claims;

		if claims.token_type != expected {
			return Err(TokenRejection::WrongType { expected, found: claims.token_type });
		}
		if claims.iat > (now + MAX_ISSUED_AT_SKEW).unix_timestamp() {
			return Err(TokenRejection::IssuedInFuture);
		}

		Ok(claims)
	}

	fn keys(&self, token_type: TokenType) -> &ClassKeys {
		match token_type {
			TokenType::Access => &self.access,
			TokenType::Refresh => &self.refresh,
		}
	}

	fn within_ceiling(&self, claims: &TokenClaims, now: OffsetDateTime) -> bool {
		claims.authenticated_at().is_some_and(|at| now - at <= self.config.remember.max_age)
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService")
			.field("issuer", &self.config.issuer)
			.field("access_ttl", &self.config.access_ttl)
			.field("refresh_ttl", &self.config.refresh_ttl)
			.field("access_grace", &self.config.access_grace)
			.finish_non_exhaustive()
	}
}

fn settle<T>(
	kind: CheckKind,
	expected: TokenType,
	token: &str,
	result: Result<T, TokenRejection>,
) -> Option<T> {
	match result {
		Ok(value) => {
			obs::record_check_outcome(kind, CheckOutcome::Pass);

			Some(value)
		},
		Err(rejection) => {
			obs::record_check_outcome(kind, CheckOutcome::Reject);
			obs::log_token_rejected(expected, &rejection, &secret::fingerprint(token));

			None
		},
	}
}

fn new_jti() -> String {
	let mut bytes = [0_u8; JTI_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}
