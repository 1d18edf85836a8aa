//! REST client toolkit: single-flight token caching, credential sign-in, and jittered
//! retry/backoff wrapped around a pluggable HTTP transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod obs;
pub mod retry;

#[cfg(test)]
mod _preludet {
	//! Shared fixtures for unit tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::auth::Token;

	/// Builds an unsigned token whose payload carries the provided `exp` claim.
	pub fn token_expiring_at(expires_at: OffsetDateTime, subject: &str) -> Token {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let claims = serde_json::json!({ "sub": subject, "exp": expires_at.unix_timestamp() });
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		Token::new(format!("{header}.{payload}."))
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{
		Client as ReqwestClient, Error as ReqwestError, Method, Request as ReqwestRequest,
		Response as ReqwestResponse, StatusCode,
		header::{HeaderMap, HeaderName, HeaderValue},
	};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use ::http as _;
#[cfg(test)] use {color_eyre as _, httpmock as _};
