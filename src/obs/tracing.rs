// self
use crate::{_prelude::*, obs::CallKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// Span wrapper used around upstream calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("search_broker.call", call = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
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
}

/// Emits a warning before sleeping ahead of another attempt.
pub fn retry_scheduled(attempt: u32, max_attempts: u32, delay: Duration, error: &impl Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		attempt,
		max_attempts,
		delay_ms = delay.whole_milliseconds() as u64,
		%error,
		"Transient upstream failure; retrying."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, max_attempts, delay, error);
}

/// Emits a warning when the attempt budget is spent.
pub fn retry_exhausted(attempts: u32, error: &impl Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(attempts, %error, "Retry budget exhausted.");
	#[cfg(not(feature = "tracing"))]
	let _ = (attempts, error);
}

/// Emits a debug event when a call succeeded after at least one retry.
pub fn retry_recovered(attempt: u32) {
	#[cfg(feature = "tracing")]
	tracing::debug!(attempt, "Upstream call recovered after retrying.");
	#[cfg(not(feature = "tracing"))]
	let _ = attempt;
}

/// Emits an info event after the cache stored a freshly minted token.
pub fn token_refreshed(token_type: &str, expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::info!(token_type, %expires_at, "Access token refreshed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (token_type, expires_at);
}

/// Emits a warning when an upstream call failed for good.
pub fn call_failed(kind: CallKind, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		call = kind.as_str(),
		reason = error.reason().as_str(),
		status = error.status(),
		attempts = error.attempts(),
		"Upstream call failed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, error);
}

/// Emits a warning when the search endpoint rejected a token and the call is replayed.
pub fn token_rejected() {
	#[cfg(feature = "tracing")]
	tracing::warn!("Search endpoint rejected the access token; replaying with a fresh one.");
}

/// Emits an info event summarizing a successful search.
pub fn search_completed(tool: &str, returned: usize, total_results: u64, elapsed_ms: u64) {
	#[cfg(feature = "tracing")]
	tracing::info!(tool, returned, total_results, elapsed_ms, "Search completed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (tool, returned, total_results, elapsed_ms);
}
