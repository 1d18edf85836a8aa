// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapping one sign-in, token refresh, or request execution.
///
/// The `outcome` and `status` fields start empty and are filled once the flow settles.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span tagged with the flow kind and the call site.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"rest_utility.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Fills the `outcome` field and, for failed HTTP exchanges, the `status` field.
	pub fn record_outcome(&self, outcome: FlowOutcome, status: Option<u16>) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());

			if let Some(status) = status {
				self.span.record("status", status);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (outcome, status);
		}
	}
}

/// Emits a `debug` event describing a scheduled retry (when enabled).
pub fn trace_retry(kind: FlowKind, attempt: u32, delay: StdDuration, status: Option<u16>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			flow = kind.as_str(),
			attempt,
			delay_ms = delay.as_millis() as u64,
			status,
			"retry scheduled"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt, delay, status);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn spans_wrap_futures_and_accept_outcomes() {
		let span = FlowSpan::new(FlowKind::TokenRefresh, "spans_wrap_futures");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);

		span.record_outcome(FlowOutcome::Failure, Some(503));
		trace_retry(FlowKind::Request, 1, StdDuration::from_millis(5), Some(429));
	}
}
