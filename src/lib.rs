//! Access-control core for multi-tenant services: signed session tokens with bounded grace,
//! fixed-window quotas over shared or local counter stores, and one identity resolver for bearer
//! and cookie callers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod error;
pub mod events;
pub mod limit;
pub mod obs;
pub mod response;
pub mod store;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and collaborators for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use http::{HeaderMap, header::COOKIE};
	use time::macros;
	// self
	use crate::{
		auth::{LookupError, LookupFuture, SessionStore, User, UserId, UserStatus, UserStore},
		events::{SecurityEvent, SecurityEventSink},
		token::{TokenConfig, TokenService},
	};
	pub use crate::clock::ManualClock;

	/// Access-token signing secret used across tests.
	pub const TEST_ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
	/// Refresh-token signing secret used across tests.
	pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";
	/// Cookie name read by [`CookieSessionStore`].
	pub const SESSION_COOKIE: &str = "sid";

	/// Deterministic starting instant for manual clocks.
	pub fn fixed_instant() -> OffsetDateTime {
		macros::datetime!(2025-11-10 12:00 UTC)
	}

	/// Builds a token configuration with the default lifetimes and the shared test secrets.
	pub fn test_token_config() -> TokenConfig {
		TokenConfig::builder()
			.access_secret(TEST_ACCESS_SECRET)
			.refresh_secret(TEST_REFRESH_SECRET)
			.build()
			.expect("Test token configuration should be valid.")
	}

	/// Builds a token service driven by the provided manual clock.
	pub fn test_token_service(clock: &ManualClock) -> TokenService {
		TokenService::new(test_token_config()).with_clock(clock.shared())
	}

	/// Builds a user with the provided identifier and status.
	pub fn user(id: &str, status: UserStatus) -> User {
		User { id: UserId::new(id).expect("User fixture identifier should be valid."), status }
	}

	/// In-memory [`UserStore`] keyed by user identifier.
	#[derive(Debug, Default)]
	pub struct MemoryUserStore(Mutex<HashMap<UserId, User>>);
	impl MemoryUserStore {
		/// Inserts or replaces a user.
		pub fn insert(&self, user: User) {
			self.0.lock().insert(user.id.clone(), user);
		}

		/// Builds a store seeded with the provided users.
		pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
			let store = Self::default();

			users.into_iter().for_each(|user| store.insert(user));

			store
		}
	}
	impl UserStore for MemoryUserStore {
		fn find_by_id<'a>(&'a self, id: &'a UserId) -> LookupFuture<'a, Option<User>> {
			let found = self.0.lock().get(id).cloned();

			Box::pin(async move { Ok(found) })
		}
	}

	/// [`SessionStore`] that maps the `sid` cookie to a user identifier.
	#[derive(Debug, Default)]
	pub struct CookieSessionStore {
		sessions: Mutex<HashMap<String, UserId>>,
		failing: bool,
	}
	impl CookieSessionStore {
		/// Registers a session id for the provided user.
		pub fn insert(&self, session_id: &str, user: &UserId) {
			self.sessions.lock().insert(session_id.to_owned(), user.clone());
		}

		/// Builds a store whose lookups always fail.
		pub fn failing() -> Self {
			Self { failing: true, ..Default::default() }
		}
	}
	impl SessionStore for CookieSessionStore {
		fn current_user<'a>(&'a self, headers: &'a HeaderMap) -> LookupFuture<'a, Option<UserId>> {
			let outcome = if self.failing {
				Err(LookupError::Backend { message: "session backend offline".into() })
			} else {
				let session_id = headers
					.get_all(COOKIE)
					.iter()
					.filter_map(|value| value.to_str().ok())
					.flat_map(|value| value.split(';'))
					.filter_map(|pair| pair.trim().split_once('='))
					.find_map(|(name, value)| (name == SESSION_COOKIE).then_some(value));

				Ok(session_id.and_then(|id| self.sessions.lock().get(id).cloned()))
			};

			Box::pin(async move { outcome })
		}
	}

	/// [`SecurityEventSink`] that keeps every event for later assertions.
	#[derive(Debug, Default)]
	pub struct RecordingEventSink(Mutex<Vec<SecurityEvent>>);
	impl RecordingEventSink {
		/// Returns a snapshot of the recorded events.
		pub fn events(&self) -> Vec<SecurityEvent> {
			self.0.lock().clone()
		}
	}
	impl SecurityEventSink for RecordingEventSink {
		fn record(&self, event: SecurityEvent) {
			self.0.lock().push(event);
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(test)] use color_eyre as _;
