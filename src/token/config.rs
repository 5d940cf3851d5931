//! Token service configuration and its validating builder.

// self
use crate::{_prelude::*, error::ConfigError, token::TokenSecret};

/// Minimum accepted signing-secret length in bytes (HS256 key size).
pub const MIN_SECRET_LEN: usize = 32;

/// Limits governing remember-me refresh chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RememberPolicy {
	/// Nominal refresh-token lifetime for remembered sessions.
	pub refresh_ttl: Duration,
	/// How long after expiry a remembered refresh token may still rotate.
	pub expired_grace: Duration,
	/// Hard ceiling on the age of a chain since its original authentication.
	pub max_age: Duration,
}
impl Default for RememberPolicy {
	fn default() -> Self {
		Self {
			refresh_ttl: Duration::days(30),
			expired_grace: Duration::days(7),
			max_age: Duration::days(60),
		}
	}
}

/// Validated configuration for [`TokenService`](crate::token::TokenService).
#[derive(Clone, Debug)]
pub struct TokenConfig {
	pub(crate) access_secret: TokenSecret,
	pub(crate) refresh_secret: TokenSecret,
	/// Value of the `iss` claim; tokens from other issuers are rejected.
	pub issuer: String,
	/// Access-token lifetime.
	pub access_ttl: Duration,
	/// Refresh-token lifetime.
	pub refresh_ttl: Duration,
	/// Window after access-token expiry during which it is still accepted.
	pub access_grace: Duration,
	/// Remember-me chain limits.
	pub remember: RememberPolicy,
}
impl TokenConfig {
	/// Default issuer claim.
	pub const DEFAULT_ISSUER: &'static str = "tollgate";

	/// Returns a builder preloaded with the default lifetimes.
	pub fn builder() -> TokenConfigBuilder {
		TokenConfigBuilder::default()
	}
}

/// Builder for [`TokenConfig`].
///
/// Both secrets are mandatory; there is no unsigned or weakly signed fallback.
#[derive(Clone, Debug)]
pub struct TokenConfigBuilder {
	access_secret: Option<TokenSecret>,
	refresh_secret: Option<TokenSecret>,
	issuer: String,
	access_ttl: Duration,
	refresh_ttl: Duration,
	access_grace: Duration,
	remember: RememberPolicy,
}
impl TokenConfigBuilder {
	/// Sets the secret that signs access tokens.
	pub fn access_secret(mut self, secret: impl Into<String>) -> Self {
		self.access_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the secret that signs refresh tokens.
	pub fn refresh_secret(mut self, secret: impl Into<String>) -> Self {
		self.refresh_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the issuer claim.
	pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = issuer.into();

		self
	}

	/// Overrides the access-token lifetime (default 15 minutes).
	pub fn access_ttl(mut self, ttl: Duration) -> Self {
		self.access_ttl = ttl;

		self
	}

	/// Overrides the refresh-token lifetime (default 7 days).
	pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
		self.refresh_ttl = ttl;

		self
	}

	/// Overrides the access-token grace window (default 60 seconds).
	pub fn access_grace(mut self, grace: Duration) -> Self {
		self.access_grace = grace;

		self
	}

	/// Overrides the remember-me limits.
	pub fn remember(mut self, policy: RememberPolicy) -> Self {
		self.remember = policy;

		self
	}

	/// Validates the settings and produces a [`TokenConfig`].
	pub fn build(self) -> Result<TokenConfig, ConfigError> {
		let access_secret = require_secret(self.access_secret, "access")?;
		let refresh_secret = require_secret(self.refresh_secret, "refresh")?;

		if access_secret == refresh_secret {
			return Err(ConfigError::SharedSecret);
		}

		require_positive(self.access_ttl, "access_ttl")?;
		require_positive(self.refresh_ttl, "refresh_ttl")?;
		require_positive(self.remember.refresh_ttl, "remember.refresh_ttl")?;
		require_positive(self.remember.max_age, "remember.max_age")?;

		if self.access_ttl >= self.refresh_ttl {
			return Err(ConfigError::LifetimeOrdering);
		}
		if self.access_grace.is_negative() {
			return Err(ConfigError::NegativeGrace { field: "access_grace" });
		}
		if self.remember.expired_grace.is_negative() {
			return Err(ConfigError::NegativeGrace { field: "remember.expired_grace" });
		}

		Ok(TokenConfig {
			access_secret,
			refresh_secret,
			issuer: self.issuer,
			access_ttl: self.access_ttl,
			refresh_ttl: self.refresh_ttl,
			access_grace: self.access_grace,
			remember: self.remember,
		})
	}
}
impl Default for TokenConfigBuilder {
	fn default() -> Self {
		Self {
			access_secret: None,
			refresh_secret: None,
			issuer: TokenConfig::DEFAULT_ISSUER.to_owned(),
			access_ttl: Duration::minutes(15),
			refresh_ttl: Duration::days(7),
			access_grace: Duration::seconds(60),
			remember: RememberPolicy::default(),
		}
	}
}

fn require_secret(
	secret: Option<TokenSecret>,
	kind: &'static str,
) -> Result<TokenSecret, ConfigError> {
	let secret = secret
		.filter(|secret| !secret.expose().is_empty())
		.ok_or(ConfigError::MissingSecret { kind })?;

	if secret.expose().len() < MIN_SECRET_LEN {
		return Err(ConfigError::WeakSecret { kind, min: MIN_SECRET_LEN });
	}

	Ok(secret)
}

fn require_positive(value: Duration, field: &'static str) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { field }) }
}
