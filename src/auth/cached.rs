//! Single-flight caching wrapper that makes any [`TokenProvider`] safe for concurrent use.
//!
//! The cached token is served from a shared read lock while it is fresh, meaning its `exp`
//! claim minus the grace period still lies in the future. Once stale, callers queue on an
//! async gate. The first caller through the gate refreshes; everyone who queued during that
//! round observes the round counter move and takes the shared outcome (token or error)
//! instead of calling the inner provider again. A failed round leaves the cache stale, so the
//! next caller after the round starts a new one.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenFuture, TokenProvider},
	obs::{self, FlowKind},
};

/// Clock used to evaluate token freshness.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Default grace period subtracted from a token's `exp` claim.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::minutes(10);

struct CachedState {
	last: Option<std::result::Result<Token, Arc<Error>>>,
	fresh_until: OffsetDateTime,
	round: u64,
}
impl CachedState {
	fn outcome(&self) -> Option<Result<Token>> {
		match self.last.as_ref()? {
			Ok(token) => Some(Ok(token.clone())),
			Err(err) => Some(Err(Error::Shared(err.clone()))),
		}
	}
}

/// Wraps a [`TokenProvider`] with refresh-on-expiry caching and single-flight refreshes.
pub struct CachedTokenProvider {
	inner: Arc<dyn TokenProvider>,
	grace_period: Duration,
	clock: Clock,
	state: RwLock<CachedState>,
	gate: AsyncMutex<()>,
}
impl CachedTokenProvider {
	/// Creates a cache around `provider` using [`DEFAULT_GRACE_PERIOD`] and the system clock.
	pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
		Self {
			inner: provider,
			grace_period: DEFAULT_GRACE_PERIOD,
			clock: Arc::new(OffsetDateTime::now_utc),
			state: RwLock::new(CachedState {
				last: None,
				fresh_until: OffsetDateTime::UNIX_EPOCH,
				round: 0,
			}),
			gate: AsyncMutex::new(()),
		}
	}

	/// Wraps `provider` unless it already is a cache, in which case the same instance is
	/// returned.
	pub fn wrap(provider: Arc<dyn TokenProvider>) -> Arc<Self> {
		match provider.clone().as_cached() {
			Some(cached) => cached,
			None => Arc::new(Self::new(provider)),
		}
	}

	/// Overrides the grace period (negative values are treated as zero).
	pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
		self.grace_period = if grace_period.is_negative() { Duration::ZERO } else { grace_period };

		self
	}

	/// Overrides the clock used for freshness checks.
	pub fn with_clock(mut self, clock: Clock) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the configured grace period.
	pub fn grace_period(&self) -> Duration {
		self.grace_period
	}

	/// Returns the cached token when fresh, otherwise joins (or starts) a refresh round.
	pub async fn fetch(&self) -> Result<Token> {
		let observed_round = match self.fresh_token() {
			Ok(token) => return Ok(token),
			Err(round) => round,
		};
		let _singleflight = self.gate.lock().await;

		if let Some(outcome) = self.completed_since(observed_round) {
			return outcome;
		}

		obs::observe(FlowKind::TokenRefresh, "cached_token_refresh", self.refresh()).await
	}

	fn fresh_token(&self) -> std::result::Result<Token, u64> {
		let state = self.state.read();

		match &state.last {
			Some(Ok(token)) if (self.clock)() < state.fresh_until => Ok(token.clone()),
			_ => Err(state.round),
		}
	}

	fn completed_since(&self, observed_round: u64) -> Option<Result<Token>> {
		let state = self.state.read();

		if state.round == observed_round { None } else { state.outcome() }
	}

	async fn refresh(&self) -> Result<Token> {
		let fetched = match self.inner.token().await {
			Ok(token) =>
				token.expires_at().map(|expires_at| (token, expires_at)).map_err(Error::from),
			Err(err) => Err(err),
		};
		let mut state = self.state.write();

		state.round = state.round.wrapping_add(1);

		match fetched {
			Ok((token, expires_at)) => {
				state.fresh_until = expires_at.checked_sub(self.grace_period).unwrap_or(expires_at);
				state.last = Some(Ok(token.clone()));

				Ok(token)
			},
			Err(err) => {
				let shared = Arc::new(err);

				state.fresh_until = OffsetDateTime::UNIX_EPOCH;
				state.last = Some(Err(shared.clone()));

				Err(Error::Shared(shared))
			},
		}
	}
}
impl TokenProvider for CachedTokenProvider {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(self.fetch())
	}

	fn as_cached(self: Arc<Self>) -> Option<Arc<CachedTokenProvider>> {
		Some(self)
	}
}
impl Debug for CachedTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("CachedTokenProvider")
			.field("grace_period", &self.grace_period)
			.field("fresh_until", &state.fresh_until)
			.field("round", &state.round)
			.finish()
	}
}
