//! Demonstrates a client that signs in with username/password, caches the identity token, and
//! retries a flaky endpoint until it answers.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use rest_utility::{
	auth::{Credentials, CredentialsTokenProvider},
	client::{Client, Request},
	http::{HttpTransport, ReqwestHttpClient},
	retry::ExponentialJitterBackoff,
	url::Url,
};

fn demo_token() -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"demo","exp":{exp}}}"#));

	format!("{header}.{payload}.")
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token = demo_token();
	let sign_in_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/sign-in");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"data":{{"tokens":{{"identityToken":"{token}"}},"challenge":null}}}}"#
			));
		})
		.await;
	let things_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/things").header("authorization", &token);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"id":1,"name":"bolt"},{"id":2,"name":"nut"}]"#);
		})
		.await;
	let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpClient::default());
	let provider = CredentialsTokenProvider::new(
		Credentials::new("demo@example.com", "demo-password", Url::parse(&server.url("/sign-in"))?),
		transport.clone(),
	)
	.with_retry(Arc::new(ExponentialJitterBackoff::new().with_max_attempts(3)));
	let client = Client::with_transport(transport)
		.with_base_url(Url::parse(&server.url("/"))?)
		.with_token_provider(Arc::new(provider));

	for _ in 0..2 {
		let things: serde_json::Value = client.execute_json(&Request::get("things")).await?;

		println!("Fetched things: {things}.");
	}

	sign_in_mock.assert_calls_async(1).await;
	things_mock.assert_calls_async(2).await;

	Ok(())
}
