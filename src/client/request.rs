//! Request description resolved against the client's base URL on every attempt.

// self
use crate::{_prelude::*, error::ConfigError, retry::RetryPredicate};

/// A re-sendable request: method, path, query, headers, and a buffered body.
#[derive(Clone)]
pub struct Request {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
	retry_predicate: Option<RetryPredicate>,
}
impl Request {
	/// Creates a request; `path` is joined onto the client's base URL, or parsed as an
	/// absolute URL when the client has none.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
			retry_predicate: None,
		}
	}

	/// Creates a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Creates a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Creates a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Creates a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Creates a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Sets a header, replacing client defaults with the same name.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type: application/json`.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body =
			serde_json::to_vec(payload).map_err(|source| ConfigError::InvalidPayload { source })?;

		self.headers
			.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(body);

		Ok(self)
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Overrides the client's retry decision for this request.
	pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
		self.retry_predicate = Some(predicate);

		self
	}

	/// Returns the request method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the unresolved path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Returns the request-specific headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the buffered body, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Returns the per-request retry predicate, if any.
	pub fn retry_predicate(&self) -> Option<&RetryPredicate> {
		self.retry_predicate.as_ref()
	}

	/// Resolves the final URL, including query parameters.
	pub fn resolve(&self, base_url: Option<&Url>) -> Result<Url, ConfigError> {
		let mut url = match base_url {
			Some(base) => base.join(&self.path),
			None => Url::parse(&self.path),
		}
		.map_err(|source| ConfigError::invalid_url(&self.path, source))?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.query);
		}

		Ok(url)
	}
}
impl Debug for Request {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Request")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("query", &self.query)
			.field("headers", &self.headers)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("retry_predicate", &self.retry_predicate.is_some())
			.finish()
	}
}
