//! Optional observability helpers for token and request flows.
//!
//! Every flow runs through `observe`, which opens the flow span and counts the attempt. It
//! then records the outcome, the elapsed time and (for failures carrying one) the HTTP status.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `rest_utility.flow` with the `flow`,
//!   `stage` (call site), `outcome` and `status` fields, plus a `debug` event for every
//!   scheduled retry.
//! - Enable `metrics` to increment `rest_utility_flow_total` (labeled by `flow` + `outcome`),
//!   record `rest_utility_flow_duration_seconds` (same labels), and increment
//!   `rest_utility_retry_total` (labeled by `flow` + `status`) for every scheduled retry.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Flow kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Credentials sign-in exchange.
	SignIn,
	/// Single-flight refresh inside a cached token provider.
	TokenRefresh,
	/// Request execution through the client.
	Request,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::SignIn => "sign_in",
			FlowKind::TokenRefresh => "token_refresh",
			FlowKind::Request => "request",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Classifies a finished flow.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `flow` inside a [`FlowSpan`] tagged with `kind` and `stage`, recording the attempt
/// before it starts and the outcome once it settles.
pub(crate) async fn observe<T, F>(kind: FlowKind, stage: &'static str, flow: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);
	let started = Instant::now();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(flow).await;
	let outcome = FlowOutcome::of(&result);

	record_flow_outcome(kind, outcome);
	record_flow_duration(kind, outcome, started.elapsed());
	span.record_outcome(outcome, result.as_ref().err().and_then(Error::status));

	result
}

/// Records a scheduled retry on every enabled backend.
///
/// `status` is the HTTP status that triggered the retry, when there is one.
pub(crate) fn record_retry(kind: FlowKind, attempt: u32, delay: StdDuration, status: Option<u16>) {
	record_retry_metric(kind, status);
	trace_retry(kind, attempt, delay, status);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::HttpError;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let value = observe(FlowKind::TokenRefresh, "observe_ok", async { Ok(7) })
			.await
			.expect("A successful flow should stay successful.");

		assert_eq!(value, 7);

		let err = observe::<(), _>(FlowKind::Request, "observe_err", async {
			Err(HttpError {
				status: 502,
				body: "upstream".into(),
				url: Url::parse("https://api.example.com/").expect("Fixture URL should parse."),
			}
			.into())
		})
		.await
		.expect_err("A failed flow should stay failed.");

		assert_eq!(err.status(), Some(502));
	}

	#[test]
	fn outcomes_follow_results() {
		assert_eq!(FlowOutcome::of(&Ok::<_, Error>(())), FlowOutcome::Success);
		assert_eq!(FlowOutcome::of::<()>(&Err(Error::Cancelled)), FlowOutcome::Failure);
		assert_eq!(FlowOutcome::Attempt.to_string(), "attempt");
	}
}
