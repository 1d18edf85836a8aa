//! "Full Jitter" exponential backoff.
//!
//! [`ExponentialJitterBackoff::backoff`] returns `random_between(0, min(cap, base * 2^attempt))`,
//! which spreads retries from many callers instead of letting them stampede in lockstep.

// crates.io
use rand::{Rng, RngCore};
// self
use crate::_prelude::*;

/// Base used when none (or zero) is configured.
pub const DEFAULT_BACKOFF_BASE: StdDuration = StdDuration::from_nanos(1);
/// Ceiling used when `base * 2^attempt` overflows.
pub const MAX_BACKOFF: StdDuration = StdDuration::from_nanos(u64::MAX);

/// Source of randomness used for jitter.
pub type JitterSource = Box<dyn RngCore + Send>;

/// Failures raised by a [`BackoffProvider`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BackoffError {
	/// The attempt counter passed the configured maximum; callers must stop retrying.
	#[error("Retry attempts exhausted: attempt {attempt} exceeds the limit of {max_attempts}.")]
	Exhausted {
		/// Attempt that was requested.
		attempt: u32,
		/// Configured maximum.
		max_attempts: u32,
	},
}

/// Computes the delay to wait before a given retry attempt.
pub trait BackoffProvider
where
	Self: Send + Sync,
{
	/// Returns the delay for `attempt`, or an error once retries must stop.
	fn backoff(&self, attempt: u32) -> Result<StdDuration, BackoffError>;
}

/// Exponentially growing, fully jittered backoff with an optional cap and attempt limit.
#[derive(Default)]
pub struct ExponentialJitterBackoff {
	base: StdDuration,
	cap: Option<StdDuration>,
	max_attempts: Option<u32>,
	rng: Option<Mutex<JitterSource>>,
}
impl ExponentialJitterBackoff {
	/// Creates a backoff using [`DEFAULT_BACKOFF_BASE`], no cap, and no attempt limit.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the base delay; zero falls back to [`DEFAULT_BACKOFF_BASE`].
	pub fn with_base(mut self, base: StdDuration) -> Self {
		self.base = base;

		self
	}

	/// Caps the exponential ceiling; zero disables the cap.
	pub fn with_cap(mut self, cap: StdDuration) -> Self {
		self.cap = (!cap.is_zero()).then_some(cap);

		self
	}

	/// Fails with [`BackoffError::Exhausted`] once `attempt > max_attempts`; zero disables the
	/// limit.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = (max_attempts > 0).then_some(max_attempts);

		self
	}

	/// Replaces the thread-local generator with a caller-supplied jitter source.
	pub fn with_rng(mut self, rng: impl 'static + RngCore + Send) -> Self {
		self.rng = Some(Mutex::new(Box::new(rng)));

		self
	}

	/// Returns the effective base delay.
	pub fn base(&self) -> StdDuration {
		if self.base.is_zero() { DEFAULT_BACKOFF_BASE } else { self.base }
	}

	/// Returns the exclusive upper bound of the jitter window for `attempt`.
	pub fn ceiling(&self, attempt: u32) -> StdDuration {
		let base = u64::try_from(self.base().as_nanos()).unwrap_or(u64::MAX);
		let mut ceiling = 1_u64
			.checked_shl(attempt)
			.and_then(|factor| base.checked_mul(factor))
			.unwrap_or(u64::MAX);

		if let Some(cap) = self.cap {
			ceiling = ceiling.min(u64::try_from(cap.as_nanos()).unwrap_or(u64::MAX));
		}

		StdDuration::from_nanos(ceiling)
	}

	fn jitter(&self, ceiling: u64) -> u64 {
		match &self.rng {
			Some(rng) => rng.lock().random_range(0..ceiling),
			None => rand::rng().random_range(0..ceiling),
		}
	}
}
impl BackoffProvider for ExponentialJitterBackoff {
	fn backoff(&self, attempt: u32) -> Result<StdDuration, BackoffError> {
		if let Some(max_attempts) = self.max_attempts {
			if attempt > max_attempts {
				return Err(BackoffError::Exhausted { attempt, max_attempts });
			}
		}

		let ceiling = u64::try_from(self.ceiling(attempt).as_nanos()).unwrap_or(u64::MAX).max(1);

		Ok(StdDuration::from_nanos(self.jitter(ceiling)))
	}
}
impl Debug for ExponentialJitterBackoff {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExponentialJitterBackoff")
			.field("base", &self.base())
			.field("cap", &self.cap)
			.field("max_attempts", &self.max_attempts)
			.field("custom_rng", &self.rng.is_some())
			.finish()
	}
}
