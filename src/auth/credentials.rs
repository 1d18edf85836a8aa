//! Username/password sign-in provider with optional retry-with-backoff.
//!
//! The provider posts `{"username", "password"}` as JSON to the sign-in endpoint and picks
//! the configured token kind out of `data.tokens`. Rate limiting and unexpected responses are
//! retried when a backoff is configured; rejected or inactivated credentials never are, since
//! another attempt cannot change the answer.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenFuture, TokenProvider},
	error::ConfigError,
	http::{self, HttpTransport},
	obs::{self, FlowKind},
	retry::BackoffProvider,
};

/// Token kind selected from the sign-in response when none is configured.
pub const DEFAULT_TOKEN_KIND: &str = "identityToken";

const INCORRECT_CREDENTIALS_MESSAGE: &str = "incorrect username or password";
const JSON: &str = "application/json";

/// Sign-in domain failures.
#[derive(Debug, ThisError)]
pub enum SignInError {
	/// The endpoint rejected the username/password pair.
	#[error("Sign-in rejected: incorrect credentials.")]
	IncorrectCredentials,
	/// The account exists but has been inactivated.
	#[error("Sign-in rejected: user has been inactivated.")]
	Inactivated,
	/// The endpoint is rate limiting sign-ins.
	#[error("Sign-in rejected: too many requests.")]
	TooManyRequests,
	/// The endpoint answered with a challenge (e.g. a forced password reset) instead of tokens.
	#[error("Sign-in challenged with `{kind}`: user password needs to be reset.")]
	Challenged {
		/// Challenge identifier.
		id: String,
		/// Challenge type.
		kind: String,
	},
	/// The response does not carry the requested token kind.
	#[error("Sign-in response does not contain a `{kind}` token.")]
	UnknownTokenType {
		/// Token kind that was requested.
		kind: String,
	},
	/// The response is not JSON.
	#[error("Sign-in returned unexpected content-type `{content_type}` with HTTP {status}: {body}")]
	UnexpectedContentType {
		/// Raw `Content-Type` header.
		content_type: String,
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The response status is not one the exchange knows how to interpret.
	#[error("Sign-in returned unexpected HTTP {status}: {message}")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Error message reported by the endpoint, if any.
		message: String,
	},
	/// The JSON response could not be decoded.
	#[error("Sign-in response with HTTP {status} could not be decoded.")]
	Decode {
		/// HTTP status code.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Returns `false` for failures that another sign-in attempt cannot fix.
pub fn is_retryable_sign_in_error(err: &Error) -> bool {
	!matches!(
		err.peel(),
		Error::SignIn(SignInError::IncorrectCredentials | SignInError::Inactivated)
	)
}

/// Username, password, and the endpoint they are exchanged at.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Account username.
	pub username: String,
	/// Account password; never logged.
	pub password: String,
	/// Sign-in endpoint.
	pub endpoint: Url,
}
impl Credentials {
	/// Bundles a username/password pair with its sign-in endpoint.
	pub fn new(username: impl Into<String>, password: impl Into<String>, endpoint: Url) -> Self {
		Self { username: username.into(), password: password.into(), endpoint }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("endpoint", &self.endpoint.as_str())
			.finish()
	}
}

#[derive(Serialize)]
struct SignInRequest<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Default, Deserialize)]
struct SignInEnvelope {
	#[serde(default)]
	data: Option<SignInData>,
	#[serde(default)]
	error: Option<SignInErrorBody>,
}

#[derive(Default, Deserialize)]
struct SignInData {
	#[serde(default)]
	tokens: HashMap<String, Token>,
	#[serde(default)]
	challenge: Option<SignInChallenge>,
}

#[derive(Deserialize)]
struct SignInChallenge {
	#[serde(default)]
	id: String,
	#[serde(default, rename = "type")]
	kind: String,
}

#[derive(Default, Deserialize)]
struct SignInErrorBody {
	#[serde(default)]
	message: String,
}

/// Signs in with username/password on every call.
///
/// The provider performs no caching of its own; wrap it in a
/// [`CachedTokenProvider`](crate::auth::CachedTokenProvider) to reuse tokens until they
/// expire.
pub struct CredentialsTokenProvider {
	credentials: Credentials,
	transport: Arc<dyn HttpTransport>,
	token_kind: String,
	retry: Option<Arc<dyn BackoffProvider>>,
}
impl CredentialsTokenProvider {
	/// Creates a provider that selects [`DEFAULT_TOKEN_KIND`] and never retries.
	pub fn new(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
		Self { credentials, transport, token_kind: DEFAULT_TOKEN_KIND.into(), retry: None }
	}

	/// Selects another token kind from the sign-in response.
	pub fn with_token_kind(mut self, kind: impl Into<String>) -> Self {
		self.token_kind = kind.into();

		self
	}

	/// Retries transient sign-in failures using `backoff`.
	pub fn with_retry(mut self, backoff: Arc<dyn BackoffProvider>) -> Self {
		self.retry = Some(backoff);

		self
	}

	/// Replaces the retry configuration.
	pub fn with_retry_option(mut self, backoff: Option<Arc<dyn BackoffProvider>>) -> Self {
		self.retry = backoff;

		self
	}

	/// Returns the credentials used for sign-in.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Performs the sign-in exchange (with retries when configured) and returns the selected
	/// token.
	pub async fn sign_in_token(&self) -> Result<Token> {
		obs::observe(FlowKind::SignIn, "sign_in_token", self.exchange()).await
	}

	async fn exchange(&self) -> Result<Token> {
		let mut data = match &self.retry {
			Some(backoff) => self.sign_in_with_retry(backoff.as_ref()).await?,
			None => self.sign_in().await?,
		};

		if let Some(challenge) = data.challenge {
			return Err(SignInError::Challenged { id: challenge.id, kind: challenge.kind }.into());
		}

		match data.tokens.remove(&self.token_kind) {
			Some(token) if !token.is_empty() => Ok(token),
			_ => Err(SignInError::UnknownTokenType { kind: self.token_kind.clone() }.into()),
		}
	}

	async fn sign_in_with_retry(&self, backoff: &dyn BackoffProvider) -> Result<SignInData> {
		let mut attempt = 1;

		loop {
			let err = match self.sign_in().await {
				Ok(data) => return Ok(data),
				Err(err) => err,
			};

			if !is_retryable_sign_in_error(&err) {
				return Err(err);
			}

			// Exhaustion surfaces the last real failure instead of the backoff error.
			let Ok(delay) = backoff.backoff(attempt) else {
				return Err(err);
			};

			obs::record_retry(FlowKind::SignIn, attempt, delay, err.status());
			tokio::time::sleep(delay).await;

			attempt += 1;
		}
	}

	async fn sign_in(&self) -> Result<SignInData> {
		let payload = serde_json::to_vec(&SignInRequest {
			username: &self.credentials.username,
			password: &self.credentials.password,
		})
		.map_err(|source| ConfigError::InvalidPayload { source })?;
		let mut request = ReqwestRequest::new(Method::POST, self.credentials.endpoint.clone());
		let headers = request.headers_mut();

		headers.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static(JSON));
		headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static(JSON));
		*request.body_mut() = Some(payload.into());

		let response = self.transport.send(request).await?;
		let status = response.status().as_u16();

		if !http::has_media_type(response.headers(), JSON) {
			let content_type = http::content_type(response.headers()).to_owned();
			let body = response.text().await?;

			return Err(SignInError::UnexpectedContentType { content_type, status, body }.into());
		}

		let body = response.bytes().await?;
		let mut de = serde_json::Deserializer::from_slice(&body);
		let envelope: SignInEnvelope = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| SignInError::Decode { status, source })?;
		let message = envelope.error.unwrap_or_default().message;

		match status {
			200 => Ok(envelope.data.unwrap_or_default()),
			400 if message == INCORRECT_CREDENTIALS_MESSAGE =>
				Err(SignInError::IncorrectCredentials.into()),
			409 => Err(SignInError::Inactivated.into()),
			429 => Err(SignInError::TooManyRequests.into()),
			_ => Err(SignInError::UnexpectedStatus { status, message }.into()),
		}
	}
}
impl TokenProvider for CredentialsTokenProvider {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(self.sign_in_token())
	}
}
impl Debug for CredentialsTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialsTokenProvider")
			.field("credentials", &self.credentials)
			.field("token_kind", &self.token_kind)
			.field("retry", &self.retry.is_some())
			.finish()
	}
}
