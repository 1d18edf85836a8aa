//! Secret-store-backed sign-in.
//!
//! Credentials are resolved from a [`SecretsClient`] the first time a token is requested and
//! kept for later sign-ins. When a sign-in with previously resolved credentials is rejected as
//! incorrect, the secret is assumed to have been rotated: the cached credentials are dropped,
//! fetched again, and the sign-in is retried exactly once.

// self
use crate::{
	_prelude::*,
	auth::{
		Credentials, CredentialsTokenProvider, DEFAULT_TOKEN_KIND, Token, TokenFuture,
		TokenProvider,
	},
	error::BoxError,
	http::HttpTransport,
	retry::BackoffProvider,
};

type SecretMap = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// Boxed future returned by [`SecretsClient::secret_by_id`].
pub type SecretFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, BoxError>> + 'a + Send>>;

/// Looks up raw secret payloads by identifier.
pub trait SecretsClient
where
	Self: Send + Sync,
{
	/// Returns the raw bytes stored under `secret_id`.
	fn secret_by_id<'a>(&'a self, secret_id: &'a str) -> SecretFuture<'a>;
}

/// Secret store failures.
#[derive(Debug, ThisError)]
pub enum SecretError {
	/// The secret store could not return the secret.
	#[error("Secret `{secret_id}` could not be fetched.")]
	Fetch {
		/// Requested secret identifier.
		secret_id: String,
		/// Store-specific failure.
		#[source]
		source: BoxError,
	},
	/// The secret payload is not a credentials document.
	#[error("Secret `{secret_id}` does not contain valid credentials.")]
	Decode {
		/// Requested secret identifier.
		secret_id: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The secret's sign-in URL cannot be parsed.
	#[error("Secret `{secret_id}` carries an invalid sign-in URL `{value}`.")]
	InvalidEndpoint {
		/// Requested secret identifier.
		secret_id: String,
		/// Offending URL.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The in-memory store holds no secret with the requested identifier.
	#[error("Secret `{secret_id}` was not found.")]
	NotFound {
		/// Requested secret identifier.
		secret_id: String,
	},
}

/// Credentials document stored in the secret store.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretCredentials {
	/// Account username.
	pub username: String,
	/// Account password.
	pub password: String,
	/// Sign-in endpoint.
	#[serde(rename = "signInUrl")]
	pub sign_in_url: String,
}
impl SecretCredentials {
	fn into_credentials(self, secret_id: &str) -> Result<Credentials, SecretError> {
		let endpoint = Url::parse(&self.sign_in_url).map_err(|source| {
			SecretError::InvalidEndpoint {
				secret_id: secret_id.to_owned(),
				value: self.sign_in_url.clone(),
				source,
			}
		})?;

		Ok(Credentials::new(self.username, self.password, endpoint))
	}
}
impl Debug for SecretCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretCredentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("sign_in_url", &self.sign_in_url)
			.finish()
	}
}

/// Thread-safe in-process [`SecretsClient`] for local development and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySecrets(SecretMap);
impl MemorySecrets {
	/// Stores (or replaces) the raw payload of `secret_id`.
	pub fn insert(&self, secret_id: impl Into<String>, payload: impl Into<Vec<u8>>) {
		self.0.write().insert(secret_id.into(), payload.into());
	}

	/// Serializes `credentials` as JSON and stores them under `secret_id`.
	pub fn insert_credentials(
		&self,
		secret_id: impl Into<String>,
		credentials: &SecretCredentials,
	) -> Result<()> {
		let payload = serde_json::to_vec(credentials)
			.map_err(|source| crate::error::ConfigError::InvalidPayload { source })?;

		self.insert(secret_id, payload);

		Ok(())
	}
}
impl SecretsClient for MemorySecrets {
	fn secret_by_id<'a>(&'a self, secret_id: &'a str) -> SecretFuture<'a> {
		let found = self.0.read().get(secret_id).cloned();

		Box::pin(async move {
			found.ok_or_else(|| {
				Box::new(SecretError::NotFound { secret_id: secret_id.to_owned() }) as BoxError
			})
		})
	}
}

/// Where to find the credentials and how to sign in with them.
#[derive(Clone)]
pub struct SecretCredentialsConfig {
	/// Identifier of the credentials secret.
	pub secret_id: String,
	/// Token kind selected from the sign-in response.
	pub token_kind: String,
	/// Backoff used to retry transient sign-in failures; `None` disables retries.
	pub retry: Option<Arc<dyn BackoffProvider>>,
}
impl SecretCredentialsConfig {
	/// Reads credentials from `secret_id`, selecting [`DEFAULT_TOKEN_KIND`] without retries.
	pub fn new(secret_id: impl Into<String>) -> Self {
		Self { secret_id: secret_id.into(), token_kind: DEFAULT_TOKEN_KIND.into(), retry: None }
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
}
impl Debug for SecretCredentialsConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretCredentialsConfig")
			.field("secret_id", &self.secret_id)
			.field("token_kind", &self.token_kind)
			.field("retry", &self.retry.is_some())
			.finish()
	}
}

/// Signs in with credentials read from a secret store.
///
/// Like [`CredentialsTokenProvider`], this provider signs in on every call; wrap it in a
/// [`CachedTokenProvider`](crate::auth::CachedTokenProvider) to reuse tokens.
pub struct SecretCredentialsTokenProvider {
	config: SecretCredentialsConfig,
	secrets: Arc<dyn SecretsClient>,
	transport: Arc<dyn HttpTransport>,
	signer: AsyncMutex<Option<Arc<CredentialsTokenProvider>>>,
}
impl SecretCredentialsTokenProvider {
	/// Creates a provider; no secret is read until the first token request.
	pub fn new(
		config: SecretCredentialsConfig,
		secrets: Arc<dyn SecretsClient>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self { config, secrets, transport, signer: AsyncMutex::new(None) }
	}

	/// Returns the provider configuration.
	pub fn config(&self) -> &SecretCredentialsConfig {
		&self.config
	}

	/// Signs in, re-reading the secret once if the cached credentials were rejected.
	pub async fn sign_in_token(&self) -> Result<Token> {
		let (signer, resolved_now) = self.signer().await?;
		let err = match signer.sign_in_token().await {
			Ok(token) => return Ok(token),
			Err(err) => err,
		};

		if !err.is_incorrect_credentials() {
			return Err(err);
		}

		self.invalidate(&signer).await;

		// Freshly read credentials that are rejected will not improve by reading them again.
		if resolved_now {
			return Err(err);
		}

		let (signer, _) = self.signer().await?;

		signer.sign_in_token().await
	}

	async fn signer(&self) -> Result<(Arc<CredentialsTokenProvider>, bool)> {
		let mut slot = self.signer.lock().await;

		if let Some(signer) = slot.as_ref() {
			return Ok((signer.clone(), false));
		}

		let credentials = self.resolve_credentials().await?;
		let signer = Arc::new(
			CredentialsTokenProvider::new(credentials, self.transport.clone())
				.with_token_kind(self.config.token_kind.clone())
				.with_retry_option(self.config.retry.clone()),
		);

		*slot = Some(signer.clone());

		Ok((signer, true))
	}

	async fn invalidate(&self, stale: &Arc<CredentialsTokenProvider>) {
		let mut slot = self.signer.lock().await;

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stale)) {
			*slot = None;
		}
	}

	async fn resolve_credentials(&self) -> Result<Credentials, SecretError> {
		let secret_id = self.config.secret_id.as_str();
		let payload = self
			.secrets
			.secret_by_id(secret_id)
			.await
			.map_err(|source| SecretError::Fetch { secret_id: secret_id.to_owned(), source })?;
		let mut de = serde_json::Deserializer::from_slice(&payload);
		let document: SecretCredentials = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| SecretError::Decode { secret_id: secret_id.to_owned(), source })?;

		document.into_credentials(secret_id)
	}
}
impl TokenProvider for SecretCredentialsTokenProvider {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(self.sign_in_token())
	}
}
impl Debug for SecretCredentialsTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretCredentialsTokenProvider").field("config", &self.config).finish()
	}
}
