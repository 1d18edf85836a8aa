//! RFC 7807 problem payloads and the decoder the executor consults for failed responses.

// self
use crate::{_prelude::*, error::BoxError, http};

/// Media type of JSON problem documents.
pub const PROBLEM_JSON: &str = "application/problem+json";

const ABOUT_BLANK: &str = "about:blank";

/// Machine-readable error payload returned by a failed request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Problem {
	/// URI reference identifying the problem type; empty means `about:blank`.
	#[serde(default, rename = "type")]
	pub problem_type: String,
	/// Short summary of the problem type.
	#[serde(default)]
	pub title: String,
	/// HTTP status of this occurrence; `0` means unknown.
	#[serde(default, skip_serializing_if = "is_zero")]
	pub status: u16,
	/// Explanation specific to this occurrence.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub detail: String,
	/// URI reference identifying the failing resource.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub instance: String,
	/// Server-side identifier for correlating logs.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub correlation_id: String,
}
impl Problem {
	/// Returns the problem type, defaulting to `about:blank`.
	pub fn problem_type(&self) -> &str {
		if self.problem_type.is_empty() { ABOUT_BLANK } else { &self.problem_type }
	}

	/// Returns the problem title.
	pub fn title(&self) -> &str {
		&self.title
	}

	/// Returns the problem status, defaulting to 500 when the payload omits it.
	pub fn status(&self) -> u16 {
		if self.status == 0 { 500 } else { self.status }
	}

	/// Returns the occurrence-specific detail.
	pub fn detail(&self) -> &str {
		&self.detail
	}
}
impl Display for Problem {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let title = if self.title.is_empty() { self.problem_type() } else { &self.title };

		if self.detail.is_empty() {
			f.write_str(title)
		} else {
			write!(f, "{title}: {}", self.detail)
		}
	}
}
impl StdError for Problem {}

fn is_zero(status: &u16) -> bool {
	*status == 0
}

/// Turns the body of a failed response into a [`Problem`].
pub trait ProblemDecoder
where
	Self: Send + Sync,
{
	/// Returns `true` when the response headers announce a payload this decoder understands.
	fn accepts(&self, headers: &HeaderMap) -> bool;

	/// Decodes the response body.
	fn decode(&self, body: &[u8]) -> Result<Problem, BoxError>;
}

/// Decodes `application/problem+json` bodies into [`Problem`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicProblemDecoder;
impl ProblemDecoder for BasicProblemDecoder {
	fn accepts(&self, headers: &HeaderMap) -> bool {
		http::has_media_type(headers, PROBLEM_JSON)
	}

	fn decode(&self, body: &[u8]) -> Result<Problem, BoxError> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de).map_err(|e| Box::new(e) as BoxError)
	}
}
