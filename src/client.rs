//! Request executor: attaches tokens, applies the retry policy, and maps failed responses.
//!
//! Every attempt rebuilds the outgoing request from the [`Request`] description, fetches a
//! token from the (always cached) token provider, and sends it through the configured
//! [`HttpTransport`]. A response the retry policy accepts for retry is discarded and the
//! executor sleeps for the policy's backoff before trying again; when the policy can no longer
//! produce a backoff the executor stops with [`Error::Retry`], which still carries the failure
//! built from the last response. Other non-2xx responses become a decoded [`Problem`] when the
//! problem decoder recognizes the payload, or a generic [`HttpError`](crate::error::HttpError)
//! otherwise.

mod problem;
mod request;
mod response;

pub use problem::*;
pub use request::*;
pub use response::*;

// self
use crate::{
	_prelude::*,
	auth::{CachedTokenProvider, TokenProvider},
	error::{ConfigError, HttpError},
	http::{HttpTransport, ReqwestHttpClient},
	obs::{self, FlowKind},
	retry::{DefaultRetryPolicy, RetryContext, RetryPolicy},
};

/// `User-Agent` sent unless a request or client default overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("rest-utility/", env!("CARGO_PKG_VERSION"));

/// Shared REST client.
///
/// Cloning is cheap; clones share the transport, token cache, and policies.
#[derive(Clone)]
pub struct Client {
	transport: Arc<dyn HttpTransport>,
	base_url: Option<Url>,
	token_provider: Option<Arc<CachedTokenProvider>>,
	retry_policy: Option<Arc<dyn RetryPolicy>>,
	problem_decoder: Option<Arc<dyn ProblemDecoder>>,
	default_headers: HeaderMap,
}
impl Client {
	/// Creates a client backed by a default [`ReqwestHttpClient`].
	pub fn new() -> Self {
		Self::with_transport(Arc::new(ReqwestHttpClient::default()))
	}

	/// Creates a client backed by `transport`, with the default retry policy and
	/// [`BasicProblemDecoder`].
	pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
		let mut default_headers = HeaderMap::new();

		default_headers
			.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

		Self {
			transport,
			base_url: None,
			token_provider: None,
			retry_policy: Some(Arc::new(DefaultRetryPolicy::default())),
			problem_decoder: Some(Arc::new(BasicProblemDecoder)),
			default_headers,
		}
	}

	/// Resolves request paths against `base_url`.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Authorizes requests with tokens from `provider`, wrapped in a [`CachedTokenProvider`]
	/// unless it already is one.
	pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
		self.token_provider = Some(CachedTokenProvider::wrap(provider));

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
		self.retry_policy = Some(policy);

		self
	}

	/// Disables retries, including per-request predicates.
	pub fn without_retries(mut self) -> Self {
		self.retry_policy = None;

		self
	}

	/// Replaces the problem decoder.
	pub fn with_problem_decoder(mut self, decoder: Arc<dyn ProblemDecoder>) -> Self {
		self.problem_decoder = Some(decoder);

		self
	}

	/// Sends `value` as `name` on every request that does not set the header itself.
	pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.default_headers.insert(name, value);

		self
	}

	/// Overrides the default `User-Agent`.
	pub fn with_user_agent(self, user_agent: HeaderValue) -> Self {
		self.with_default_header(reqwest::header::USER_AGENT, user_agent)
	}

	/// Returns the configured base URL.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Returns the cached token provider, if one is configured.
	pub fn token_provider(&self) -> Option<&Arc<CachedTokenProvider>> {
		self.token_provider.as_ref()
	}

	/// Executes `request`, retrying according to the client's policy.
	pub async fn execute(&self, request: &Request) -> Result<Response> {
		obs::observe(FlowKind::Request, "execute", self.run(request)).await
	}

	/// Executes `request`, aborting token acquisition, I/O, and backoff sleeps with
	/// [`Error::Cancelled`] once `cancel` fires.
	pub async fn execute_with_cancel(
		&self,
		request: &Request,
		cancel: &CancellationToken,
	) -> Result<Response> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled),
			result = self.execute(request) => result,
		}
	}

	/// Executes `request` and decodes the successful body as JSON.
	pub async fn execute_json<T>(&self, request: &Request) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		self.execute(request).await?.json().await
	}

	async fn run(&self, request: &Request) -> Result<Response> {
		let url = request.resolve(self.base_url.as_ref())?;
		let mut attempt = 1;

		loop {
			let outgoing = self.prepare(request, url.clone()).await?;
			let response = self.transport.send(outgoing).await?;
			let status = response.status();

			if let Some(policy) = &self.retry_policy {
				let headers = response.headers();
				let context = RetryContext { request, status, headers, attempt };
				let retry = match request.retry_predicate() {
					Some(predicate) => predicate(&context),
					None => policy.should_retry(&context),
				};

				if retry {
					let delay = match policy.backoff(&context) {
						Ok(delay) => delay,
						Err(source) => {
							let last = self.failure(response, url.clone()).await;

							return Err(Error::Retry {
								url,
								status: status.as_u16(),
								source,
								last: Box::new(last),
							});
						},
					};

					drop(response);
					obs::record_retry(FlowKind::Request, attempt, delay, Some(status.as_u16()));
					tokio::time::sleep(delay).await;

					attempt += 1;

					continue;
				}
			}

			return self.finish(response, url).await;
		}
	}

	async fn prepare(&self, request: &Request, url: Url) -> Result<ReqwestRequest> {
		let mut headers = self.default_headers.clone();

		headers.extend(request.headers().clone());

		if let Some(provider) = &self.token_provider {
			let token = provider
				.fetch()
				.await
				.map_err(|source| Error::Authorization { source: Box::new(source) })?;
			let mut value = HeaderValue::from_str(token.expose()).map_err(|source| {
				ConfigError::InvalidHeaderValue { name: reqwest::header::AUTHORIZATION, source }
			})?;

			value.set_sensitive(true);
			headers.insert(reqwest::header::AUTHORIZATION, value);
		}

		let mut outgoing = ReqwestRequest::new(request.method().clone(), url);

		*outgoing.headers_mut() = headers;
		*outgoing.body_mut() = request.body().map(|body| body.to_vec().into());

		Ok(outgoing)
	}

	async fn finish(&self, response: ReqwestResponse, url: Url) -> Result<Response> {
		if response.status().is_success() {
			Ok(Response::new(response))
		} else {
			Err(self.failure(response, url).await)
		}
	}

	/// Builds the error reported for a non-2xx response, preferring a decoded problem.
	async fn failure(&self, response: ReqwestResponse, url: Url) -> Error {
		let status = response.status().as_u16();
		let headers = response.headers().clone();
		let body = match response.bytes().await {
			Ok(body) => body,
			Err(e) => return e.into(),
		};

		if let Some(decoder) = &self.problem_decoder {
			if decoder.accepts(&headers) {
				// Undecodable problem payloads are reported as plain HTTP failures.
				if let Ok(problem) = decoder.decode(&body) {
					return problem.into();
				}
			}
		}

		HttpError { status, body: String::from_utf8_lossy(&body).into_owned(), url }.into()
	}
}
impl Default for Client {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("base_url", &self.base_url.as_ref().map(Url::as_str))
			.field("token_provider", &self.token_provider)
			.field("retries", &self.retry_policy.is_some())
			.field("problem_decoder", &self.problem_decoder.is_some())
			.field("default_headers", &self.default_headers)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use time::macros::format_description;
	use tokio::time::Instant;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::TransportError,
		http::TransportFuture,
		retry::{BackoffError, BackoffProvider, ExponentialJitterBackoff},
	};

	struct Reply {
		status: u16,
		headers: Vec<(&'static str, String)>,
		body: &'static str,
	}
	impl Reply {
		fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
			self.headers.push((name, value.into()));

			self
		}
	}

	#[derive(Default)]
	struct ScriptedTransport {
		replies: Mutex<VecDeque<Reply>>,
		seen: Mutex<Vec<ReqwestRequest>>,
		calls: AtomicUsize,
	}
	impl ScriptedTransport {
		fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
			let replies = Mutex::new(replies.into_iter().collect());

			Arc::new(Self { replies, ..Default::default() })
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: ReqwestRequest) -> TransportFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen.lock().push(request);

			let next = self.replies.lock().pop_front();

			Box::pin(async move {
				let reply = next.ok_or_else(|| {
					TransportError::Io(std::io::Error::other("Script exhausted."))
				})?;
				let mut builder = ::http::Response::builder().status(reply.status);

				for (name, value) in reply.headers {
					builder = builder.header(name, value);
				}

				let response =
					builder.body(reply.body.as_bytes().to_vec()).map_err(TransportError::network)?;

				Ok(ReqwestResponse::from(response))
			})
		}
	}

	/// Backoff far longer than any test may sleep; only a server hint keeps tests short.
	struct GlacialBackoff;
	impl BackoffProvider for GlacialBackoff {
		fn backoff(&self, _: u32) -> Result<StdDuration, BackoffError> {
			Ok(StdDuration::from_secs(3_600))
		}
	}

	fn reply(status: u16, content_type: &str, body: &'static str) -> Reply {
		Reply { status, headers: vec![("content-type", content_type.to_owned())], body }
	}

	fn client(transport: Arc<ScriptedTransport>) -> Client {
		let base_url = Url::parse("https://api.example.com/").expect("Fixture URL should parse.");

		Client::with_transport(transport).with_base_url(base_url)
	}

	fn hint_only() -> Arc<dyn RetryPolicy> {
		Arc::new(DefaultRetryPolicy::with_backoff(Arc::new(GlacialBackoff)))
	}

	fn limited(max_attempts: u32) -> Arc<dyn RetryPolicy> {
		Arc::new(DefaultRetryPolicy::with_backoff(Arc::new(
			ExponentialJitterBackoff::new()
				.with_base(StdDuration::from_millis(1))
				.with_max_attempts(max_attempts),
		)))
	}

	#[tokio::test]
	async fn default_headers_and_raw_token_are_attached() {
		let transport = ScriptedTransport::new([reply(200, "application/json", "{}")]);
		let token = token_expiring_at(OffsetDateTime::now_utc() + Duration::hours(1), "svc");
		let client = client(transport.clone()).with_token_provider(Arc::new(token.clone()));

		client.execute(&Request::get("things")).await.expect("A 200 should succeed.");

		let seen = transport.seen.lock();
		let headers = seen[0].headers();

		assert_eq!(seen[0].url().as_str(), "https://api.example.com/things");
		assert_eq!(headers[reqwest::header::USER_AGENT], DEFAULT_USER_AGENT);
		assert_eq!(headers[reqwest::header::AUTHORIZATION], token.expose());
	}

	#[tokio::test]
	async fn request_headers_override_client_defaults() {
		let transport = ScriptedTransport::new([reply(204, "text/plain", "")]);
		let client = client(transport.clone())
			.with_user_agent(HeaderValue::from_static("client-agent"))
			.with_default_header(
				HeaderName::from_static("x-tenant"),
				HeaderValue::from_static("acme"),
			);
		let request = Request::delete("things/1")
			.with_header(reqwest::header::USER_AGENT, HeaderValue::from_static("request-agent"));

		client.execute(&request).await.expect("A 204 should succeed.");

		let seen = transport.seen.lock();

		assert_eq!(seen[0].headers()[reqwest::header::USER_AGENT], "request-agent");
		assert_eq!(seen[0].headers()["x-tenant"], "acme");
	}

	#[tokio::test]
	async fn retries_until_success() {
		let transport = ScriptedTransport::new([
			reply(503, "text/plain", "busy"),
			reply(502, "text/plain", "busy"),
			reply(200, "application/json", r#"{"id":7}"#),
		]);
		let value: serde_json::Value = client(transport.clone())
			.execute_json(&Request::get("things/7"))
			.await
			.expect("The third attempt should succeed.");

		assert_eq!(value["id"], 7);
		assert_eq!(transport.calls(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn delay_seconds_hint_schedules_the_next_attempt() {
		let transport = ScriptedTransport::new([
			reply(503, "text/plain", "busy").with_header("retry-after", "2"),
			reply(200, "application/json", "{}"),
		]);
		let client = client(transport.clone()).with_retry_policy(hint_only());
		let started = Instant::now();

		client.execute(&Request::get("things")).await.expect("The retry should succeed.");

		let waited = started.elapsed();

		assert!(waited >= StdDuration::from_secs(2), "Waited {waited:?}.");
		assert!(waited < StdDuration::from_secs(3), "Waited {waited:?}.");
		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn http_date_hint_schedules_the_next_attempt() {
		let imf_fixdate = format_description!(
			"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
		);
		let retry_at = (OffsetDateTime::now_utc() + Duration::seconds(5))
			.format(&imf_fixdate)
			.expect("Fixture date should format.");
		let transport = ScriptedTransport::new([
			reply(429, "text/plain", "slow down").with_header("retry-after", retry_at),
			reply(200, "application/json", "{}"),
		]);
		let client = client(transport.clone()).with_retry_policy(hint_only());
		let started = Instant::now();

		client.execute(&Request::get("things")).await.expect("The retry should succeed.");

		let waited = started.elapsed();

		// The date carries whole seconds, so up to one second of the hint is truncated.
		assert!(waited >= StdDuration::from_secs(3), "Waited {waited:?}.");
		assert!(waited < StdDuration::from_secs(6), "Waited {waited:?}.");
		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn hints_keep_retrying_past_the_attempt_limit() {
		let busy = || reply(503, "text/plain", "busy").with_header("retry-after", "1");
		let transport =
			ScriptedTransport::new([busy(), busy(), busy(), reply(200, "application/json", "{}")]);

		client(transport.clone())
			.with_retry_policy(limited(1))
			.execute(&Request::get("things"))
			.await
			.expect("Hinted retries should not exhaust the backoff.");

		assert_eq!(transport.calls(), 4);
	}

	#[tokio::test]
	async fn exhausted_retries_keep_the_last_response() {
		let transport = ScriptedTransport::new([
			reply(503, "text/plain", "warming up"),
			reply(503, "text/plain", "maintenance window until 12:00"),
		]);
		let err = client(transport.clone())
			.with_retry_policy(limited(1))
			.execute(&Request::get("things"))
			.await
			.expect_err("The second 503 should exhaust retries.");

		assert!(matches!(
			err,
			Error::Retry { status: 503, source: BackoffError::Exhausted { attempt: 2, .. }, .. }
		));
		assert!(err.to_string().contains("maintenance window until 12:00"));
		assert!(matches!(
			err.last_response(),
			Some(Error::Http(last)) if last.body() == "maintenance window until 12:00"
		));
		assert_eq!(err.status(), Some(503));
		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test]
	async fn exhausted_retries_keep_a_decoded_problem() {
		let unavailable = || {
			reply(
				503,
				"application/problem+json",
				r#"{"type":"/problems/unavailable","title":"Down for maintenance","status":503}"#,
			)
		};
		let transport = ScriptedTransport::new([unavailable(), unavailable()]);
		let err = client(transport)
			.with_retry_policy(limited(1))
			.execute(&Request::get("things"))
			.await
			.expect_err("The second 503 should exhaust retries.");
		let Some(Error::Problem(problem)) = err.last_response() else {
			panic!("Expected the last response to be a problem, got {err:?}.");
		};

		assert_eq!(problem.problem_type(), "/problems/unavailable");
	}

	#[tokio::test]
	async fn non_retryable_status_maps_to_http_error() {
		let transport = ScriptedTransport::new([reply(404, "text/plain", "missing")]);
		let err = client(transport.clone())
			.execute(&Request::get("things/9"))
			.await
			.expect_err("A 404 should fail.");
		let Error::Http(http_error) = err else {
			panic!("Expected an HTTP error, got {err:?}.");
		};

		assert_eq!(http_error.status(), 404);
		assert_eq!(http_error.body(), "missing");
		assert_eq!(http_error.url().as_str(), "https://api.example.com/things/9");
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn problem_payloads_are_decoded() {
		let transport = ScriptedTransport::new([reply(
			422,
			"application/problem+json",
			r#"{"type":"/problems/validation","title":"Validation Failed","status":422}"#,
		)]);
		let err = client(transport)
			.execute(&Request::post("things").with_body("{}"))
			.await
			.expect_err("A 422 should fail.");
		let Error::Problem(problem) = err else {
			panic!("Expected a problem, got {err:?}.");
		};

		assert_eq!(problem.problem_type(), "/problems/validation");
		assert_eq!(problem.status(), 422);
	}

	#[tokio::test]
	async fn undecodable_problem_falls_back_to_http_error() {
		let transport = ScriptedTransport::new([reply(400, "application/problem+json", "oops")]);
		let err = client(transport)
			.execute(&Request::get("things"))
			.await
			.expect_err("A 400 should fail.");

		assert!(matches!(err, Error::Http(ref e) if e.body() == "oops"));
	}

	#[tokio::test]
	async fn without_retries_returns_first_failure() {
		let transport = ScriptedTransport::new([reply(503, "text/plain", "busy")]);
		let err = client(transport.clone())
			.without_retries()
			.execute(&Request::get("things"))
			.await
			.expect_err("A 503 should fail without retries.");

		assert_eq!(err.status(), Some(503));
		assert_eq!(transport.calls(), 1);
	}
}
