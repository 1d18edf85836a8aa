//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use time::{Duration, OffsetDateTime};
// self
use rest_utility::{
	auth::Token,
	http::{HttpTransport, ReqwestHttpClient},
	retry::{BackoffProvider, ExponentialJitterBackoff},
	url::Url,
};

/// Path the mock sign-in endpoint listens on.
pub const SIGN_IN_PATH: &str = "/sign-in";

/// Builds an unsigned token whose payload carries the provided `exp` claim.
pub fn token_expiring_at(expires_at: OffsetDateTime, subject: &str) -> Token {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let claims = serde_json::json!({ "sub": subject, "exp": expires_at.unix_timestamp() });
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	Token::new(format!("{header}.{payload}."))
}

/// Builds a token valid for one hour.
pub fn hour_long_token(subject: &str) -> Token {
	token_expiring_at(OffsetDateTime::now_utc() + Duration::hours(1), subject)
}

/// Default reqwest transport shared by providers and clients under test.
pub fn transport() -> Arc<dyn HttpTransport> {
	Arc::new(ReqwestHttpClient::default())
}

/// Resolves `path` on the mock server.
pub fn mock_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

/// Millisecond-scale backoff that allows `max_attempts` retries.
pub fn fast_backoff(max_attempts: u32) -> Arc<dyn BackoffProvider> {
	Arc::new(
		ExponentialJitterBackoff::new()
			.with_base(StdDuration::from_millis(1))
			.with_cap(StdDuration::from_millis(5))
			.with_max_attempts(max_attempts),
	)
}

/// JSON body of a successful sign-in.
pub fn sign_in_success(identity: &Token, access: &Token) -> String {
	serde_json::json!({
		"data": {
			"tokens": { "identityToken": identity.expose(), "accessToken": access.expose() },
			"challenge": null
		}
	})
	.to_string()
}

/// JSON body of a sign-in rejected for incorrect credentials.
pub fn sign_in_incorrect() -> String {
	serde_json::json!({ "error": { "message": "incorrect username or password" } }).to_string()
}
