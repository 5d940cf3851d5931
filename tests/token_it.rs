#![cfg(feature = "test")]

// self
use tollgate::{
	_preludet::*,
	auth::UserId,
	token::{TokenConfig, TokenService, TokenType},
};

fn subject() -> UserId {
	UserId::new("u1").expect("Subject fixture should be valid.")
}

#[test]
fn access_token_lives_fifteen_minutes_plus_grace() {
	let clock = ManualClock::new(fixed_instant());
	let tokens = test_token_service(&clock);
	let pair = tokens.issue_pair(&subject(), "u1@example.com").expect("Pair should be issued.");
	let access = pair.access_token.expose();
	let claims = tokens.verify_access(access).expect("Fresh access token should verify.");

	assert_eq!(claims.subject_id, subject());
	assert_eq!(claims.email, "u1@example.com");
	assert_eq!(pair.expires_in, 900);

	clock.advance(Duration::seconds(901));

	assert!(tokens.verify_access(access).is_some(), "Token inside the grace window must verify.");

	clock.advance(Duration::seconds(60));

	assert!(tokens.verify_access(access).is_none(), "Token past the grace window must fail.");
}

#[test]
fn successive_refreshes_issue_distinct_newer_tokens() {
	let clock = ManualClock::new(fixed_instant());
	let tokens = test_token_service(&clock);
	let mut pair = tokens.issue_pair(&subject(), "u1@example.com").expect("Pair should be issued.");
	let mut seen = vec![pair.access_token.clone()];
	let mut last_iat =
		tokens.verify_access(pair.access_token.expose()).expect("Access token should verify.").iat;

	for _ in 0..3 {
		clock.advance(Duration::minutes(10));

		pair = tokens.refresh(pair.refresh_token.expose()).expect("Refresh should succeed.");

		let claims =
			tokens.verify_access(pair.access_token.expose()).expect("Access token should verify.");

		assert!(claims.iat > last_iat);
		assert!(!seen.contains(&pair.access_token));

		last_iat = claims.iat;
		seen.push(pair.access_token.clone());
	}
}

#[test]
fn token_classes_cannot_stand_in_for_each_other() {
	let clock = ManualClock::new(fixed_instant());
	let tokens = test_token_service(&clock);
	let pair = tokens.issue_pair(&subject(), "u1@example.com").expect("Pair should be issued.");

	assert!(tokens.verify_access(pair.refresh_token.expose()).is_none());
	assert!(tokens.verify_refresh(pair.access_token.expose()).is_none());
	assert!(tokens.refresh(pair.access_token.expose()).is_none());
	assert_eq!(
		tokens.verify_refresh(pair.refresh_token.expose()).map(|claims| claims.token_type),
		Some(TokenType::Refresh)
	);
}

#[test]
fn tokens_from_another_deployment_are_rejected() {
	let clock = ManualClock::new(fixed_instant());
	let tokens = test_token_service(&clock);
	let foreign = TokenService::new(
		TokenConfig::builder()
			.access_secret("another-access-secret-0123456789abcdef")
			.refresh_secret("another-refresh-secret-0123456789abcdef")
			.build()
			.expect("Foreign configuration should be valid."),
	)
	.with_clock(clock.shared());
	let pair = foreign.issue_pair(&subject(), "u1@example.com").expect("Pair should be issued.");

	assert!(tokens.verify_access(pair.access_token.expose()).is_none());
	assert!(tokens.refresh(pair.refresh_token.expose()).is_none());
}

#[test]
fn remembered_sessions_end_at_the_hard_ceiling() {
	let clock = ManualClock::new(fixed_instant());
	let tokens = test_token_service(&clock);
	let mut pair = tokens
		.issue_pair_with(&subject(), "u1@example.com", true)
		.expect("Remembered pair should be issued.");

	// Refresh weekly; the chain still ends 60 days after the original login.
	for _ in 0..8 {
		clock.advance(Duration::days(7));

		pair = tokens.refresh(pair.refresh_token.expose()).expect("Weekly refresh should succeed.");
	}

	clock.advance(Duration::days(4) + Duration::seconds(1));

	assert!(tokens.refresh(pair.refresh_token.expose()).is_none());
	assert!(tokens.refresh_remembered(pair.refresh_token.expose()).is_none());
}
