//! Walks one request through the access-control core: identity resolution via a bearer token,
//! then the login quota until it trips and renders a 429.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
// self
use tollgate::{
	_preludet::{CookieSessionStore, MemoryUserStore, user},
	auth::{AuthResolver, UserId, UserStatus},
	clock,
	events::TracingEventSink,
	limit::{EndpointClass, RateLimitTable, RateLimiters},
	response,
	store::MemoryCounterStore,
	token::{TokenConfig, TokenService},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let tokens = Arc::new(TokenService::new(
		TokenConfig::builder()
			.access_secret("demo-access-secret-0123456789abcdef")
			.refresh_secret("demo-refresh-secret-0123456789abcdef")
			.build()?,
	));
	let users = Arc::new(MemoryUserStore::with_users([user("u1", UserStatus::Active)]));
	let resolver = AuthResolver::new(tokens.clone(), Arc::new(CookieSessionStore::default()), users);
	let store = Arc::new(
		MemoryCounterStore::new(clock::system())
			.with_sweeper(MemoryCounterStore::DEFAULT_SWEEP_INTERVAL),
	);
	let limiters =
		RateLimiters::new(&RateLimitTable::default(), store, clock::system(), Arc::new(TracingEventSink))?;
	let pair = tokens.issue_pair(&UserId::new("u1")?, "u1@example.com")?;
	let mut headers = HeaderMap::new();

	headers.insert(
		AUTHORIZATION,
		HeaderValue::from_str(&format!("Bearer {}", pair.access_token.expose()))?,
	);

	match resolver.resolve(&headers).await {
		Some(identity) => println!("Resolved {} via {}.", identity.id, identity.source.as_str()),
		None => println!("Unauthenticated: {}.", response::unauthorized().body()),
	}

	for attempt in 1..=6 {
		let decision = limiters.check(EndpointClass::Login, "203.0.113.7").await?;

		if decision.allowed {
			println!("Login attempt {attempt} allowed; {} remaining.", decision.remaining);
		} else {
			let denial = response::too_many_requests(&decision);

			println!("Login attempt {attempt} denied with {}: {}.", denial.status(), denial.body());
		}
	}

	Ok(())
}
