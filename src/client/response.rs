//! Successful responses returned by the executor.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// A 2xx response; the body has already been decompressed by the transport.
#[derive(Debug)]
pub struct Response(ReqwestResponse);
impl Response {
	/// Wraps a transport response.
	pub fn new(response: ReqwestResponse) -> Self {
		Self(response)
	}

	/// Returns the HTTP status.
	pub fn status(&self) -> StatusCode {
		self.0.status()
	}

	/// Returns the response headers.
	pub fn headers(&self) -> &HeaderMap {
		self.0.headers()
	}

	/// Returns the URL the response was received from.
	pub fn url(&self) -> &Url {
		self.0.url()
	}

	/// Reads the full body.
	pub async fn bytes(self) -> Result<Vec<u8>> {
		Ok(self.0.bytes().await?.to_vec())
	}

	/// Reads the full body as text, honoring the declared charset.
	pub async fn text(self) -> Result<String> {
		Ok(self.0.text().await?)
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub async fn json<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.0.bytes().await?;
		let mut de = serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { source })
	}

	/// Returns the underlying transport response.
	pub fn into_inner(self) -> ReqwestResponse {
		self.0
	}
}
