//! User records and the lookup collaborators the resolver consumes.

// crates.io
use http::HeaderMap;
// self
use crate::{_prelude::*, auth::UserId};

/// Boxed future returned by collaborator lookups.
pub type LookupFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LookupError>> + 'a + Send>>;

/// Account lifecycle state; only [`UserStatus::Active`] users resolve to an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
	/// Account in good standing.
	Active,
	/// Account not yet activated or voluntarily paused.
	Inactive,
	/// Account blocked by an operator.
	Suspended,
	/// Account removed; kept only for referential integrity.
	Deleted,
}
impl UserStatus {
	/// Returns `true` for accounts allowed to authenticate.
	pub fn is_active(self) -> bool {
		matches!(self, UserStatus::Active)
	}
}

/// User record as seen by the access-control core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Stable identifier.
	pub id: UserId,
	/// Lifecycle state.
	pub status: UserStatus,
}

/// Failure raised by a lookup collaborator.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LookupError {
	/// The backing store could not answer.
	#[error("Identity backend failed: {message}.")]
	Backend {
		/// Backend-provided detail.
		message: String,
	},
}

/// Source of user records.
pub trait UserStore
where
	Self: Send + Sync,
{
	/// Loads the user with the provided identifier.
	fn find_by_id<'a>(&'a self, id: &'a UserId) -> LookupFuture<'a, Option<User>>;
}

/// Framework-managed cookie sessions.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the user bound to the request's session cookie, if any.
	fn current_user<'a>(&'a self, headers: &'a HeaderMap) -> LookupFuture<'a, Option<UserId>>;
}
