//! Retry decisions for the request executor.

// self
use crate::{
	_prelude::*,
	client::Request,
	retry::{BackoffError, BackoffProvider, ExponentialJitterBackoff, retry_after_header},
};

/// Per-request override of the client's retry decision.
pub type RetryPredicate = Arc<dyn Fn(&RetryContext<'_>) -> bool + Send + Sync>;

/// Everything a retry decision may look at for one attempt.
#[derive(Debug)]
pub struct RetryContext<'a> {
	/// Request being executed.
	pub request: &'a Request,
	/// Status of the response just received.
	pub status: StatusCode,
	/// Headers of the response just received.
	pub headers: &'a HeaderMap,
	/// Retry counter; `1` for the first retry.
	pub attempt: u32,
}

/// Decides whether a response should be retried and how long to wait first.
pub trait RetryPolicy
where
	Self: Send + Sync,
{
	/// Returns `true` when the request should be sent again.
	fn should_retry(&self, context: &RetryContext<'_>) -> bool;

	/// Returns the delay before the next attempt, or an error once retries must stop.
	fn backoff(&self, context: &RetryContext<'_>) -> Result<StdDuration, BackoffError>;
}

/// Returns `true` for statuses that usually clear up on their own (429, 500, 502, 503, 504).
pub fn is_retryable_status(status: StatusCode) -> bool {
	matches!(
		status,
		StatusCode::TOO_MANY_REQUESTS
			| StatusCode::INTERNAL_SERVER_ERROR
			| StatusCode::BAD_GATEWAY
			| StatusCode::SERVICE_UNAVAILABLE
			| StatusCode::GATEWAY_TIMEOUT
	)
}

/// Predicate that applies [`is_retryable_status`] to idempotent methods only.
pub fn idempotent_only() -> RetryPredicate {
	const IDEMPOTENT: [Method; 6] =
		[Method::GET, Method::HEAD, Method::PUT, Method::DELETE, Method::OPTIONS, Method::TRACE];

	Arc::new(|context: &RetryContext<'_>| {
		IDEMPOTENT.contains(context.request.method()) && is_retryable_status(context.status)
	})
}

/// Default policy: retries [`is_retryable_status`] responses, honoring `Retry-After` before
/// falling back to jittered exponential backoff.
pub struct DefaultRetryPolicy {
	backoff: Arc<dyn BackoffProvider>,
}
impl DefaultRetryPolicy {
	/// Base delay of the default backoff.
	pub const DEFAULT_BASE: StdDuration = StdDuration::from_millis(1);
	/// Cap of the default backoff.
	pub const DEFAULT_CAP: StdDuration = StdDuration::from_millis(50);
	/// Attempt limit of the default backoff.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

	/// Uses `backoff` whenever the server does not send a usable `Retry-After` hint.
	pub fn with_backoff(backoff: Arc<dyn BackoffProvider>) -> Self {
		Self { backoff }
	}
}
impl Default for DefaultRetryPolicy {
	fn default() -> Self {
		Self::with_backoff(Arc::new(
			ExponentialJitterBackoff::new()
				.with_base(Self::DEFAULT_BASE)
				.with_cap(Self::DEFAULT_CAP)
				.with_max_attempts(Self::DEFAULT_MAX_ATTEMPTS),
		))
	}
}
impl RetryPolicy for DefaultRetryPolicy {
	fn should_retry(&self, context: &RetryContext<'_>) -> bool {
		is_retryable_status(context.status)
	}

	fn backoff(&self, context: &RetryContext<'_>) -> Result<StdDuration, BackoffError> {
		match retry_after_header(context.headers) {
			Some(Ok(hint)) => Ok(hint),
			_ => self.backoff.backoff(context.attempt),
		}
	}
}
impl Debug for DefaultRetryPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DefaultRetryPolicy").finish_non_exhaustive()
	}
}
