//! Opaque bearer token wrapper with best-effort expiry extraction.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

const SEGMENTS: usize = 3;

/// Failures raised while reading the claims embedded in a [`Token`].
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("Invalid token: found {found} segments, expected 3.")]
	Segments {
		/// Number of dot-separated segments actually present.
		found: usize,
	},
	/// The payload segment is not URL-safe base64 without padding.
	#[error("Invalid token: payload is not base64 decodable.")]
	PayloadEncoding {
		/// Underlying decoding failure.
		#[source]
		source: base64::DecodeError,
	},
	/// The payload is not a JSON object with an integer `exp` claim.
	#[error("Invalid token: claims are not decodable.")]
	Claims {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The `exp` claim lies outside the representable calendar range.
	#[error("Invalid token: exp claim {exp} is out of range.")]
	ExpiryOutOfRange {
		/// Raw claim value.
		exp: i64,
	},
}

#[derive(Deserialize)]
struct ExpiryClaims {
	#[serde(default)]
	exp: i64,
}

/// Opaque bearer credential attached to outgoing requests.
///
/// The value is redacted from `Debug`/`Display` output; use [`Token::expose`] when the raw
/// string is required (e.g. for an `Authorization` header).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);
impl Token {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the token carries no value at all.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Extracts the `exp` claim from the token payload.
	///
	/// The signature is never verified, so the result must only drive cache lifetimes and
	/// never trust decisions. A payload without an `exp` claim yields the Unix epoch, which
	/// makes the token count as already expired.
	pub fn expires_at(&self) -> Result<OffsetDateTime, TokenError> {
		let segments = self.0.split('.').collect::<Vec<_>>();

		// Exactly header, payload and signature; extra segments (e.g. JWE) are rejected too.
		if segments.len() != SEGMENTS {
			return Err(TokenError::Segments { found: segments.len() });
		}

		let payload = URL_SAFE_NO_PAD
			.decode(segments[1])
			.map_err(|source| TokenError::PayloadEncoding { source })?;
		let mut de = serde_json::Deserializer::from_slice(&payload);
		let claims: ExpiryClaims = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| TokenError::Claims { source })?;

		OffsetDateTime::from_unix_timestamp(claims.exp)
			.map_err(|_| TokenError::ExpiryOutOfRange { exp: claims.exp })
	}
}
impl AsRef<str> for Token {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<String> for Token {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for Token {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Token").field(&"<redacted>").finish()
	}
}
impl Display for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
