//! Process-wide access token cache with coalesced refreshes.
//!
//! [`TokenCache::get_token`] hands out the current token while its expiry is more than the
//! refresh margin away. Once the token goes stale, the first caller opens a refresh generation
//! (a shared [`AsyncOnceCell`]) and every concurrent caller awaits that same cell, so at most
//! one exchange is in flight and all waiters observe the same token or the same error. The
//! state mutex only guards synchronous bookkeeping and is never held across an `.await`. If the
//! task driving a refresh is cancelled, the next waiter re-runs the initializer.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSource},
	obs::{self, CallKind, CallOutcome, CallSpan},
	retry::RetryPolicy,
};

type RefreshCell = Arc<AsyncOnceCell<Result<AccessToken>>>;

/// Shared token cache; wrap in [`Arc`] and hand it to every search proxy.
pub struct TokenCache {
	source: Arc<dyn TokenSource>,
	retry: RetryPolicy,
	refresh_margin: Duration,
	state: Mutex<CacheState>,
	metrics: Arc<RefreshMetrics>,
}
impl TokenCache {
	/// Default safety margin before expiry inside which a token is no longer handed out.
	pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::seconds(30);

	/// Creates an empty cache fed by `source` with the default retry policy and margin.
	pub fn new(source: Arc<dyn TokenSource>) -> Self {
		Self {
			source,
			retry: RetryPolicy::default(),
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			state: Mutex::new(CacheState::default()),
			metrics: Default::default(),
		}
	}

	/// Overrides the retry policy applied to each refresh.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the safety margin (negative values clamp to zero).
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Safety margin currently applied.
	pub fn refresh_margin(&self) -> Duration {
		self.refresh_margin
	}

	/// Refresh counters for diagnostics.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Snapshot of the current token, fresh or not.
	pub fn cached_token(&self) -> Option<AccessToken> {
		self.state.lock().current.clone()
	}

	/// Returns a token valid for longer than the refresh margin, refreshing when needed.
	pub async fn get_token(&self) -> Result<AccessToken> {
		let cell = {
			let mut state = self.state.lock();
			let now = OffsetDateTime::now_utc();

			if let Some(token) =
				state.current.as_ref().filter(|token| token.is_fresh_at(now, self.refresh_margin))
			{
				self.metrics.record_reuse();

				return Ok(token.clone());
			}

			state.in_flight.get_or_insert_with(|| Arc::new(AsyncOnceCell::new())).clone()
		};
		let result = cell.get_or_init(|| self.refresh()).await.clone();

		self.settle(&cell, &result);

		result
	}

	/// Drops the current token if it is still `token`; a newer token is left in place.
	///
	/// Returns `true` when the token was cleared.
	pub fn invalidate(&self, token: &AccessToken) -> bool {
		let mut state = self.state.lock();

		if state.current.as_ref().is_some_and(|current| current.value == token.value) {
			state.current = None;

			return true;
		}

		false
	}

	async fn refresh(&self) -> Result<AccessToken> {
		const KIND: CallKind = CallKind::TokenRefresh;

		let span = CallSpan::new(KIND, "get_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.retry.run(|_| self.source.fetch_token())).await;

		match &result {
			Ok(token) => {
				self.metrics.record_success();
				obs::record_call_outcome(KIND, CallOutcome::Success);
				obs::token_refreshed(&token.token_type, token.expires_at);
			},
			Err(err) => {
				self.metrics.record_failure();
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				obs::call_failed(KIND, err);
			},
		}

		result
	}

	// The first waiter to settle a generation closes it; later waiters of the same generation
	// find a different (or no) cell and leave the state alone.
	fn settle(&self, cell: &RefreshCell, result: &Result<AccessToken>) {
		let mut state = self.state.lock();

		if !state.in_flight.as_ref().is_some_and(|open| Arc::ptr_eq(open, cell)) {
			return;
		}

		state.in_flight = None;

		if let Ok(token) = result {
			state.current = Some(token.clone());
		}
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("TokenCache")
			.field("refresh_margin", &self.refresh_margin)
			.field("has_token", &state.current.is_some())
			.field("refreshing", &state.in_flight.is_some())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[derive(Default)]
struct CacheState {
	current: Option<AccessToken>,
	in_flight: Option<RefreshCell>,
}
