//! Transport primitives shared by the sign-in exchange and the request executor.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. The default
//! [`ReqwestHttpClient`] adapter forwards to a [`ReqwestClient`], which also takes care of
//! `Accept-Encoding` negotiation and gzip decompression keyed on `Content-Encoding`.

// std
use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ReqwestResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to send a fully prepared request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared between a
/// client and the token providers that sign in on its behalf.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once response headers are available.
	fn send(&self, request: ReqwestRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests time out after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).build()?;

		Ok(Self(client))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl HttpTransport for ReqwestHttpClient {
	fn send(&self, request: ReqwestRequest) -> TransportFuture<'_> {
		Box::pin(async move { self.0.execute(request).await.map_err(TransportError::from) })
	}
}

/// Returns `true` when the response `Content-Type` names `media_type`, ignoring parameters.
pub(crate) fn has_media_type(headers: &HeaderMap, media_type: &str) -> bool {
	content_type(headers)
		.split(';')
		.next()
		.is_some_and(|essence| essence.trim().eq_ignore_ascii_case(media_type))
}

/// Returns the raw `Content-Type` header, or an empty string when absent or not ASCII.
pub(crate) fn content_type(headers: &HeaderMap) -> &str {
	headers
		.get(reqwest::header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn media_type_ignores_parameters_and_case() {
		let mut headers = HeaderMap::new();

		assert!(!has_media_type(&headers, "application/json"));

		headers.insert(
			reqwest::header::CONTENT_TYPE,
			HeaderValue::from_static("Application/JSON; charset=utf-8"),
		);

		assert!(has_media_type(&headers, "application/json"));
		assert!(!has_media_type(&headers, "application/problem+json"));
	}

	#[test]
	fn timeout_client_builds() {
		ReqwestHttpClient::with_timeout(StdDuration::from_secs(5))
			.expect("A timeout-only reqwest client should build.");
	}
}
