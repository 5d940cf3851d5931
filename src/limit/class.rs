//! Endpoint classes, their quota rules, and the configuration table that maps one to the other.

// self
use crate::{_prelude::*, error::ConfigError};

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Endpoint class; each class owns a distinct key namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
	/// Credential login attempts, keyed by caller address.
	Login,
	/// Account registration.
	Register,
	/// Password-reset requests.
	PasswordReset,
	/// Email-verification sends.
	EmailVerification,
	/// Generic API traffic.
	Api,
	/// Search queries.
	Search,
	/// File uploads.
	Upload,
	/// Bulk exports.
	Export,
	/// Health probes.
	Health,
}
impl EndpointClass {
	/// Every class, in table order.
	pub const ALL: [Self; 9] = [
		Self::Login,
		Self::Register,
		Self::PasswordReset,
		Self::EmailVerification,
		Self::Api,
		Self::Search,
		Self::Upload,
		Self::Export,
		Self::Health,
	];

	/// Returns the key namespace owned by the class.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Login => "login",
			Self::Register => "register",
			Self::PasswordReset => "password_reset",
			Self::EmailVerification => "email_verification",
			Self::Api => "api",
			Self::Search => "search",
			Self::Upload => "upload",
			Self::Export => "export",
			Self::Health => "health",
		}
	}

	/// Returns `true` when denials must be reported as security events.
	pub const fn is_security_sensitive(self) -> bool {
		matches!(self, Self::Login | Self::PasswordReset)
	}

	/// Built-in quota for the class.
	pub const fn default_rule(self) -> RateLimitRule {
		match self {
			Self::Login => RateLimitRule::new(5, 15 * MINUTE_MS),
			Self::Register | Self::PasswordReset => RateLimitRule::new(3, HOUR_MS),
			Self::EmailVerification => RateLimitRule::new(5, 10 * MINUTE_MS),
			Self::Api => RateLimitRule::new(100, MINUTE_MS),
			Self::Search => RateLimitRule::new(30, MINUTE_MS),
			Self::Upload => RateLimitRule::new(10, HOUR_MS),
			Self::Export => RateLimitRule::new(5, HOUR_MS),
			Self::Health => RateLimitRule::new(1_000, MINUTE_MS),
		}
	}

	pub(crate) const fn index(self) -> usize {
		self as usize
	}
}
impl Display for EndpointClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for EndpointClass {
	type Err = ConfigError;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|class| class.as_str() == name)
			.ok_or_else(|| ConfigError::UnknownClass { name: name.to_owned() })
	}
}

/// Fixed-window quota: at most `max_requests` per `window_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
	/// Requests allowed inside one window.
	pub max_requests: u64,
	/// Window length in milliseconds.
	pub window_ms: u64,
}
impl RateLimitRule {
	/// Creates a rule; see [`RateLimitRule::validate`] for the accepted range.
	pub const fn new(max_requests: u64, window_ms: u64) -> Self {
		Self { max_requests, window_ms }
	}

	/// Window length as a [`Duration`].
	pub fn window(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.window_ms).unwrap_or(i64::MAX))
	}

	/// Rejects rules that could never admit a request.
	pub fn validate(&self, namespace: &str) -> Result<(), ConfigError> {
		if self.max_requests == 0 {
			return Err(ConfigError::EmptyQuota { namespace: namespace.to_owned() });
		}
		if self.window_ms == 0 {
			return Err(ConfigError::NonPositiveDuration { field: "window_ms" });
		}

		Ok(())
	}
}

/// Static quota configuration for every [`EndpointClass`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitTable([RateLimitRule; EndpointClass::ALL.len()]);
impl RateLimitTable {
	/// Parses a JSON object of per-class overrides layered over the defaults.
	///
	/// ```json
	/// { "login": { "max_requests": 10, "window_ms": 900000 } }
	/// ```
	///
	/// Keys are class namespaces; an unknown key fails with [`ConfigError::UnknownClass`].
	pub fn from_json(document: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(document);
		let overrides: BTreeMap<String, RateLimitRule> =
			serde_path_to_error::deserialize(deserializer)
				.map_err(|source| ConfigError::RateLimitTable { source })?;

		overrides.into_iter().try_fold(Self::default(), |table, (name, rule)| {
			table.with_rule(name.parse()?, rule)
		})
	}

	/// Replaces the rule for one class.
	pub fn with_rule(mut self, class: EndpointClass, rule: RateLimitRule) -> Result<Self, ConfigError> {
		rule.validate(class.as_str())?;

		self.0[class.index()] = rule;

		Ok(self)
	}

	/// Rule currently configured for `class`.
	pub fn rule(&self, class: EndpointClass) -> RateLimitRule {
		self.0[class.index()]
	}
}
impl Default for RateLimitTable {
	fn default() -> Self {
		Self(EndpointClass::ALL.map(EndpointClass::default_rule))
	}
}
