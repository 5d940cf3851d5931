//! Crate-level error types shared by the token service, counter stores, and configuration.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// Token verification failures never appear here; they collapse into `None` at the public surface
/// so callers cannot tell missing credentials from invalid ones.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Counter-store failure that could not be recovered locally.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token claims could not be signed.
	#[error("Token could not be signed.")]
	Signing {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}

/// Configuration and validation failures raised while wiring the core.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A signing secret was not supplied.
	#[error("The {kind} token signing secret is missing.")]
	MissingSecret {
		/// Token class the secret signs.
		kind: &'static str,
	},
	/// A signing secret is shorter than the supported minimum.
	#[error("The {kind} token signing secret must be at least {min} bytes.")]
	WeakSecret {
		/// Token class the secret signs.
		kind: &'static str,
		/// Minimum accepted length in bytes.
		min: usize,
	},
	/// Access and refresh tokens would share one secret.
	#[error("Access and refresh tokens must be signed with distinct secrets.")]
	SharedSecret,
	/// A lifetime or window is zero or negative.
	#[error("The {field} value must be positive.")]
	NonPositiveDuration {
		/// Configuration field name.
		field: &'static str,
	},
	/// Access tokens would outlive refresh tokens.
	#[error("Access-token lifetime must be shorter than refresh-token lifetime.")]
	LifetimeOrdering,
	/// A grace window is negative.
	#[error("The {field} grace window cannot be negative.")]
	NegativeGrace {
		/// Configuration field name.
		field: &'static str,
	},
	/// A rate-limit rule allows zero requests.
	#[error("Rate-limit rule `{namespace}` must allow at least one request.")]
	EmptyQuota {
		/// Namespace the rule applies to.
		namespace: String,
	},
	/// A rate-limit table names an endpoint class that does not exist.
	#[error("Rate-limit table names unknown endpoint class `{name}`.")]
	UnknownClass {
		/// Key as written in the table.
		name: String,
	},
	/// A rate-limit table document could not be parsed.
	#[error("Rate-limit table is invalid.")]
	RateLimitTable {
		/// Structured parsing failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Unavailable { message: "connection refused".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("connection refused"));

		let source =
			StdError::source(&error).expect("Crate error should expose the store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn config_errors_render_field_names() {
		let error: Error = ConfigError::MissingSecret { kind: "refresh" }.into();

		assert_eq!(error.to_string(), "The refresh token signing secret is missing.");
		assert_eq!(
			ConfigError::NonPositiveDuration { field: "access_ttl" }.to_string(),
			"The access_ttl value must be positive."
		);
	}
}
