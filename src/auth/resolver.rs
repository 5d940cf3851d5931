//! Ordered credential chain that turns request headers into an active user identity.

// crates.io
use http::{HeaderMap, Request, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{LookupFuture, SessionStore, User, UserId, UserStore},
	obs::{self, CheckKind, CheckOutcome, CheckSpan},
	token::TokenService,
};

const BEARER_SCHEME: &str = "bearer";

/// Mechanism through which a request authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
	/// `Authorization: Bearer <access token>`.
	Bearer,
	/// Framework-managed session cookie.
	Cookie,
}
impl IdentitySource {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			IdentitySource::Bearer => "bearer",
			IdentitySource::Cookie => "cookie",
		}
	}
}

/// Per-request authentication result; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	/// Authenticated user id.
	pub id: UserId,
	/// User record loaded for this request.
	pub user: User,
	/// How the request authenticated.
	pub source: IdentitySource,
}

/// What a credential strategy concluded about a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialClaim {
	/// The strategy's credential is not present; the next strategy runs.
	Absent,
	/// The credential is present but invalid; resolution stops without an identity.
	Rejected,
	/// The credential names this user.
	Subject(UserId),
}

/// One link in the resolver chain.
pub trait CredentialResolver
where
	Self: Send + Sync,
{
	/// Source reported for identities this strategy produces.
	fn source(&self) -> IdentitySource;

	/// Inspects the request headers for this strategy's credential.
	fn claim<'a>(&'a self, headers: &'a HeaderMap) -> LookupFuture<'a, CredentialClaim>;
}

/// Bearer-token strategy backed by access-token verification.
#[derive(Clone, Debug)]
pub struct BearerCredential(Arc<TokenService>);
impl BearerCredential {
	/// Creates the strategy.
	pub fn new(tokens: Arc<TokenService>) -> Self {
		Self(tokens)
	}
}
impl CredentialResolver for BearerCredential {
	fn source(&self) -> IdentitySource {
		IdentitySource::Bearer
	}

	fn claim<'a>(&'a self, headers: &'a HeaderMap) -> LookupFuture<'a, CredentialClaim> {
		let claim = match bearer_token(headers) {
			None => CredentialClaim::Absent,
			Some(None) => CredentialClaim::Rejected,
			Some(Some(token)) => match self.0.verify_access(token) {
				Some(claims) => CredentialClaim::Subject(claims.subject_id),
				None => CredentialClaim::Rejected,
			},
		};

		Box::pin(async move { Ok(claim) })
	}
}

/// Cookie-session strategy backed by the framework session store.
#[derive(Clone)]
pub struct SessionCredential(Arc<dyn SessionStore>);
impl SessionCredential {
	/// Creates the strategy.
	pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
		Self(sessions)
	}
}
impl CredentialResolver for SessionCredential {
	fn source(&self) -> IdentitySource {
		IdentitySource::Cookie
	}

	fn claim<'a>(&'a self, headers: &'a HeaderMap) -> LookupFuture<'a, CredentialClaim> {
		Box::pin(async move {
			let user = self.0.current_user(headers).await?;

			Ok(user.map_or(CredentialClaim::Absent, CredentialClaim::Subject))
		})
	}
}
impl Debug for SessionCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SessionCredential(..)")
	}
}

/// Resolves request identities through an ordered credential chain.
///
/// The first strategy whose credential is present decides; later strategies are not consulted.
/// Every failure, including collaborator errors, yields `None`.
#[derive(Clone)]
pub struct AuthResolver {
	chain: Vec<Arc<dyn CredentialResolver>>,
	users: Arc<dyn UserStore>,
}
impl AuthResolver {
	/// Builds the default chain: bearer token first, then cookie session.
	pub fn new(
		tokens: Arc<TokenService>,
		sessions: Arc<dyn SessionStore>,
		users: Arc<dyn UserStore>,
	) -> Self {
		Self::with_chain(
			vec![Arc::new(BearerCredential::new(tokens)), Arc::new(SessionCredential::new(sessions))],
			users,
		)
	}

	/// Builds a resolver over a custom strategy chain.
	pub fn with_chain(chain: Vec<Arc<dyn CredentialResolver>>, users: Arc<dyn UserStore>) -> Self {
		Self { chain, users }
	}

	/// Resolves the identity of a request from its headers.
	pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
		const KIND: CheckKind = CheckKind::Resolve;

		let span = CheckSpan::new(KIND, "resolve");

		obs::record_check_outcome(KIND, CheckOutcome::Attempt);

		let identity = span.instrument(self.walk(headers)).await;
		let outcome = if identity.is_some() { CheckOutcome::Pass } else { CheckOutcome::Reject };

		obs::record_check_outcome(KIND, outcome);

		identity
	}

	/// Resolves the identity of a full request.
	pub async fn resolve_request<B>(&self, request: &Request<B>) -> Option<Identity> {
		self.resolve(request.headers()).await
	}

	async fn walk(&self, headers: &HeaderMap) -> Option<Identity> {
		for resolver in &self.chain {
			let source = resolver.source();

			match resolver.claim(headers).await {
				Ok(CredentialClaim::Absent) => continue,
				Ok(CredentialClaim::Rejected) => return None,
				Ok(CredentialClaim::Subject(id)) => return self.load_active(id, source).await,
				Err(error) => {
					obs::log_lookup_failure(source, &error);

					return None;
				},
			}
		}

		None
	}

	async fn load_active(&self, id: UserId, source: IdentitySource) -> Option<Identity> {
		match self.users.find_by_id(&id).await {
			Ok(Some(user)) if user.status.is_active() => Some(Identity { id, user, source }),
			Ok(_) => None,
			Err(error) => {
				obs::log_lookup_failure(source, &error);

				None
			},
		}
	}
}
impl Debug for AuthResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let sources = self.chain.iter().map(|resolver| resolver.source()).collect::<Vec<_>>();

		f.debug_struct("AuthResolver").field("chain", &sources).finish_non_exhaustive()
	}
}

/// `None` without a bearer `Authorization` header, `Some(None)` when one is present but unusable.
fn bearer_token(headers: &HeaderMap) -> Option<Option<&str>> {
	let value = headers.get(AUTHORIZATION)?;
	let Ok(value) = value.to_str() else { return Some(None) };
	let value = value.trim();
	let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));

	if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
		return None;
	}

	let token = token.trim();

	Some((!token.is_empty()).then_some(token))
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;
	use crate::{_preludet::*, auth::UserStatus};

	fn headers(authorization: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(
			AUTHORIZATION,
			HeaderValue::from_str(authorization).expect("Header fixture should be valid."),
		);

		headers
	}

	#[test]
	fn bearer_scheme_parsing() {
		assert_eq!(bearer_token(&HeaderMap::new()), None);
		assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
		assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some(Some("abc.def.ghi")));
		assert_eq!(bearer_token(&headers("bearer   abc")), Some(Some("abc")));
		assert_eq!(bearer_token(&headers("Bearer")), Some(None));
		assert_eq!(bearer_token(&headers("Bearer   ")), Some(None));
	}

	#[tokio::test]
	async fn inactive_users_do_not_resolve() {
		let clock = ManualClock::new(fixed_instant());
		let tokens = Arc::new(test_token_service(&clock));
		let users = Arc::new(MemoryUserStore::with_users([user("u1", UserStatus::Suspended)]));
		let resolver = AuthResolver::new(tokens.clone(), Arc::new(CookieSessionStore::default()), users);
		let pair = tokens
			.issue_pair(&UserId::new("u1").expect("Subject fixture should be valid."), "u1@example.com")
			.expect("Pair should be issued.");

		assert!(
			resolver.resolve(&headers(&format!("Bearer {}", pair.access_token.expose()))).await.is_none()
		);
	}

	#[tokio::test]
	async fn lookup_failures_collapse_to_none() {
		let clock = ManualClock::new(fixed_instant());
		let resolver = AuthResolver::new(
			Arc::new(test_token_service(&clock)),
			Arc::new(CookieSessionStore::failing()),
			Arc::new(MemoryUserStore::default()),
		);

		assert!(resolver.resolve(&HeaderMap::new()).await.is_none());
	}
}
