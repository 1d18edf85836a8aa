//! Client-level error types shared across token providers, retry policies, and the executor.

// self
use crate::{
	_prelude::*,
	auth::{SecretError, SignInError, TokenError},
	client::Problem,
	retry::BackoffError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Type-erased error returned by pluggable backends such as secret stores.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, body read).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token structure could not be interpreted.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Sign-in exchange failed.
	#[error(transparent)]
	SignIn(#[from] SignInError),
	/// Secret store lookup failed.
	#[error(transparent)]
	Secret(#[from] SecretError),
	/// Non-2xx response without a recognized problem payload.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Non-2xx response carrying a decoded problem payload.
	#[error(transparent)]
	Problem(Box<Problem>),

	/// Token acquisition failed before the request could be sent.
	#[error("Unable to get token: {source}")]
	Authorization {
		/// Underlying token provider failure.
		#[source]
		source: Box<Error>,
	},
	/// The retry policy refused to compute another backoff.
	#[error("Retries for {url} stopped after HTTP {status} ({source}). Last response: {last}")]
	Retry {
		/// URL of the request being retried.
		url: Url,
		/// Status of the last observed response.
		status: u16,
		/// Backoff failure (typically exhaustion).
		#[source]
		source: BackoffError,
		/// Failure built from the last observed response.
		last: Box<Error>,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The caller cancelled the operation.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Result shared between every waiter of a single-flight refresh.
	#[error(transparent)]
	Shared(Arc<Error>),
}
impl Error {
	/// Returns the underlying error, looking through [`Error::Shared`] and
	/// [`Error::Authorization`] wrappers.
	pub fn peel(&self) -> &Error {
		match self {
			Self::Shared(inner) => inner.peel(),
			Self::Authorization { source } => source.peel(),
			other => other,
		}
	}

	/// Returns the failure built from the last response of an exhausted retry sequence.
	pub fn last_response(&self) -> Option<&Error> {
		match self.peel() {
			Self::Retry { last, .. } => Some(last),
			_ => None,
		}
	}

	/// Returns `true` if the underlying failure is a sign-in rejection caused by
	/// incorrect credentials.
	pub fn is_incorrect_credentials(&self) -> bool {
		matches!(self.peel(), Self::SignIn(SignInError::IncorrectCredentials))
	}

	/// Returns the HTTP status of HTTP and problem failures.
	pub fn status(&self) -> Option<u16> {
		match self.peel() {
			Self::Http(err) => Some(err.status),
			Self::Problem(problem) => Some(problem.status()),
			Self::Retry { status, .. } => Some(*status),
			_ => None,
		}
	}
}
impl From<Problem> for Error {
	fn from(problem: Problem) -> Self {
		Self::Problem(Box::new(problem))
	}
}

/// Configuration and validation failures raised before any I/O happens.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request or endpoint URL cannot be parsed or joined.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request payload could not be serialized.
	#[error("Request payload could not be serialized.")]
	InvalidPayload {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// A value cannot be carried in the named header.
	#[error("Value for header `{name}` is not a valid header value.")]
	InvalidHeaderValue {
		/// Header name.
		name: HeaderName,
		/// Underlying validation failure.
		#[source]
		source: reqwest::header::InvalidHeaderValue,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_url(value: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while performing the HTTP request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while performing the HTTP request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		TransportError::from(e).into()
	}
}

/// Generic failure for a non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request to {url} failed with HTTP {status}: {}.", body_or_placeholder(.body))]
pub struct HttpError {
	/// HTTP status code.
	pub status: u16,
	/// Response body, decoded as UTF-8 (lossy).
	pub body: String,
	/// URL of the request that failed.
	pub url: Url,
}
impl HttpError {
	/// Returns the HTTP status code.
	pub fn status(&self) -> u16 {
		self.status
	}

	/// Returns the response body text.
	pub fn body(&self) -> &str {
		&self.body
	}

	/// Returns the request URL.
	pub fn url(&self) -> &Url {
		&self.url
	}
}

fn body_or_placeholder(body: &str) -> &str {
	if body.is_empty() { "[no body]" } else { body }
}
