//! Bounded exponential backoff around fallible upstream calls.
//!
//! [`RetryPolicy`] wraps any async operation returning a [`Retryable`] error. Transient failures
//! (timeouts, connection failures, 5xx, 429) are retried with jittered exponential backoff,
//! honoring a server-supplied `Retry-After` when present; terminal failures surface after the
//! first attempt. When the budget runs out the last failure is handed back through
//! [`Retryable::exhausted`], so callers see the original reason rather than a generic timeout.
//! Dropping the returned future cancels any pending sleep and never schedules another attempt.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, obs};

/// Classification a [`Retryable`] error gives the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// The failure is transient; retry after backoff (or the upstream hint, when present).
	Retry {
		/// Server-supplied delay, if any.
		retry_after: Option<Duration>,
	},
	/// The failure is terminal; surface it immediately.
	Stop,
}

/// Errors the retry policy can classify.
pub trait Retryable
where
	Self: Sized,
{
	/// Decides whether another attempt may succeed.
	fn retry_decision(&self) -> RetryDecision;

	/// Wraps the last transient failure once the attempt budget is spent.
	fn exhausted(self, _attempts: u32) -> Self {
		self
	}
}
impl Retryable for Error {
	fn retry_decision(&self) -> RetryDecision {
		Error::retry_decision(self)
	}

	fn exhausted(self, attempts: u32) -> Self {
		Error::RetryExhausted { attempts, last: Box::new(self) }
	}
}

/// Retry configuration shared by the token cache and the search proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Maximum number of attempts, including the first one.
	pub max_attempts: u32,
	/// Backoff before the second attempt.
	pub initial_delay: Duration,
	/// Upper bound for computed backoff.
	pub max_delay: Duration,
	/// Growth factor applied per attempt.
	pub multiplier: u32,
	/// Randomizes each delay within `[delay / 2, delay]` when enabled.
	pub jitter: bool,
	/// Upper bound for server-supplied `Retry-After` hints.
	pub max_retry_after: Duration,
}
impl RetryPolicy {
	const DEFAULT_INITIAL_DELAY: Duration = Duration::milliseconds(200);
	const DEFAULT_MAX_ATTEMPTS: u32 = 4;
	const DEFAULT_MAX_DELAY: Duration = Duration::seconds(5);
	const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::seconds(30);

	/// Creates the default policy: 4 attempts, 200 ms doubling to at most 5 s, with jitter.
	pub fn new() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			initial_delay: Self::DEFAULT_INITIAL_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
			multiplier: 2,
			jitter: true,
			max_retry_after: Self::DEFAULT_MAX_RETRY_AFTER,
		}
	}

	/// Policy that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self::new().with_max_attempts(1)
	}

	/// Overrides the attempt budget (clamped to at least one attempt).
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Overrides the first backoff delay.
	pub fn with_initial_delay(mut self, delay: Duration) -> Self {
		self.initial_delay = clamp_non_negative(delay);

		self
	}

	/// Overrides the backoff ceiling.
	pub fn with_max_delay(mut self, delay: Duration) -> Self {
		self.max_delay = clamp_non_negative(delay);

		self
	}

	/// Overrides the growth factor (clamped to at least 1).
	pub fn with_multiplier(mut self, multiplier: u32) -> Self {
		self.multiplier = multiplier.max(1);

		self
	}

	/// Enables or disables jitter.
	pub fn with_jitter(mut self, jitter: bool) -> Self {
		self.jitter = jitter;

		self
	}

	/// Overrides the ceiling applied to `Retry-After` hints.
	pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
		self.max_retry_after = clamp_non_negative(ceiling);

		self
	}

	/// Backoff before attempt `attempt + 1`, without jitter.
	pub fn backoff_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1);
		let factor = i32::try_from(self.multiplier.saturating_pow(exponent)).unwrap_or(i32::MAX);

		self.initial_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
	}

	/// Delay to sleep after a transient failure of attempt `attempt`.
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
		let backoff = self.backoff_for(attempt);
		let backoff = if self.jitter { jittered(backoff) } else { backoff };

		match retry_after {
			Some(hint) => backoff.max(clamp_non_negative(hint).min(self.max_retry_after)),
			None => backoff,
		}
	}

	/// Runs `operation` until it succeeds, fails terminally, or the budget runs out.
	///
	/// The closure receives the 1-based attempt number.
	pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Retryable + Display,
	{
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 1;

		loop {
			let err = match operation(attempt).await {
				Ok(value) => {
					if attempt > 1 {
						obs::retry_recovered(attempt);
					}

					return Ok(value);
				},
				Err(err) => err,
			};
			let RetryDecision::Retry { retry_after } = err.retry_decision() else {
				return Err(err);
			};

			if attempt >= max_attempts {
				obs::retry_exhausted(attempt, &err);

				return Err(err.exhausted(attempt));
			}

			let delay = self.delay_for(attempt, retry_after);

			obs::retry_scheduled(attempt, max_attempts, delay, &err);
			tokio::time::sleep(delay.unsigned_abs()).await;

			attempt += 1;
		}
	}

	/// Binds `operation` to this policy so it can be invoked repeatedly.
	pub fn wrap<F>(self, operation: F) -> RetryingOperation<F> {
		RetryingOperation { policy: self, operation }
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new()
	}
}

/// Operation bound to a [`RetryPolicy`], produced by [`RetryPolicy::wrap`].
#[derive(Clone, Debug)]
pub struct RetryingOperation<F> {
	policy: RetryPolicy,
	operation: F,
}
impl<F> RetryingOperation<F> {
	/// Policy applied on every call.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Runs the wrapped operation under the policy.
	pub async fn call<Fut, T, E>(&self) -> Result<T, E>
	where
		F: Fn(u32) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Retryable + Display,
	{
		self.policy.run(|attempt| (self.operation)(attempt)).await
	}
}

fn jittered(delay: Duration) -> Duration {
	let millis = u64::try_from(delay.whole_milliseconds()).unwrap_or(0);

	if millis < 2 {
		return delay;
	}

	let picked = rand::rng().random_range(millis / 2..=millis);

	Duration::milliseconds(i64::try_from(picked).unwrap_or(i64::MAX))
}

fn clamp_non_negative(value: Duration) -> Duration {
	if value.is_negative() { Duration::ZERO } else { value }
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::error::{AuthError, SearchError};

	fn upstream(status: u16) -> Error {
		SearchError::Upstream { status, body: format!("status {status}"), retry_after: None }
			.into()
	}

	#[test]
	fn default_policy_values() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.max_attempts, 4);
		assert_eq!(policy.initial_delay, Duration::milliseconds(200));
		assert_eq!(policy.max_delay, Duration::seconds(5));
		assert!(policy.jitter);
		assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
		assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts, 1);
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let policy = RetryPolicy::new().with_jitter(false);

		assert_eq!(policy.backoff_for(1), Duration::milliseconds(200));
		assert_eq!(policy.backoff_for(2), Duration::milliseconds(400));
		assert_eq!(policy.backoff_for(3), Duration::milliseconds(800));
		assert_eq!(policy.backoff_for(10), Duration::seconds(5));
		assert_eq!(policy.backoff_for(60), Duration::seconds(5));
	}

	#[test]
	fn jitter_stays_within_half_window() {
		let policy = RetryPolicy::new();

		for _ in 0..64 {
			let delay = policy.delay_for(3, None);

			assert!(delay >= Duration::milliseconds(400) && delay <= Duration::milliseconds(800));
		}
	}

	#[test]
	fn retry_after_hint_is_honored_and_capped() {
		let policy = RetryPolicy::new().with_jitter(false);

		assert_eq!(policy.delay_for(1, Some(Duration::seconds(3))), Duration::seconds(3));
		assert_eq!(policy.delay_for(1, Some(Duration::hours(1))), Duration::seconds(30));
		assert_eq!(policy.delay_for(3, Some(Duration::milliseconds(10))), Duration::milliseconds(800));
	}

	#[tokio::test(start_paused = true)]
	async fn five_unavailable_responses_then_success() {
		let policy = RetryPolicy::new().with_max_attempts(6);
		let calls = AtomicU32::new(0);
		let result = policy
			.run(|_| {
				let n = calls.fetch_add(1, Ordering::SeqCst);

				async move { if n < 5 { Err(upstream(503)) } else { Ok(200_u16) } }
			})
			.await
			.expect("The sixth attempt should succeed.");

		assert_eq!(result, 200);
		assert_eq!(calls.load(Ordering::SeqCst), 6);
	}

	#[tokio::test(start_paused = true)]
	async fn client_errors_fail_without_retry() {
		let policy = RetryPolicy::new();
		let calls = AtomicU32::new(0);
		let err = policy
			.run(|_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err::<(), _>(upstream(400)) }
			})
			.await
			.expect_err("A 400 response must fail immediately.");

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(matches!(err, Error::Search(SearchError::Upstream { status: 400, .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_surfaces_last_error() {
		let policy = RetryPolicy::new().with_max_attempts(3);
		let calls = AtomicU32::new(0);
		let err = policy
			.run(|attempt| {
				calls.fetch_add(1, Ordering::SeqCst);

				async move {
					Err::<(), _>(Error::from(AuthError::EndpointUnreachable {
						status: Some(502),
						retry_after: None,
						message: format!("attempt {attempt}"),
					}))
				}
			})
			.await
			.expect_err("Persistent 502 responses must exhaust the budget.");

		assert_eq!(calls.load(Ordering::SeqCst), 3);

		match err {
			Error::RetryExhausted { attempts, last } => {
				assert_eq!(attempts, 3);
				assert!(last.to_string().contains("attempt 3"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn retry_after_delays_next_attempt() {
		let policy = RetryPolicy::new().with_jitter(false).with_max_attempts(2);
		let started = tokio::time::Instant::now();
		let calls = AtomicU32::new(0);
		let _ = policy
			.run(|_| {
				let n = calls.fetch_add(1, Ordering::SeqCst);

				async move {
					if n == 0 {
						Err(Error::from(SearchError::Upstream {
							status: 429,
							body: String::new(),
							retry_after: Some(Duration::seconds(7)),
						}))
					} else {
						Ok(())
					}
				}
			})
			.await;

		assert!(started.elapsed() >= std::time::Duration::from_secs(7));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_future_stops_retrying() {
		let policy = RetryPolicy::new().with_jitter(false).with_max_attempts(10);
		let calls = Arc::new(AtomicU32::new(0));
		let counter = calls.clone();
		let run = policy.run(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);

			async { Err::<(), _>(upstream(503)) }
		});
		let outcome = tokio::time::timeout(std::time::Duration::from_millis(300), run).await;

		assert!(outcome.is_err(), "The timeout should cancel the retry loop.");

		let observed = calls.load(Ordering::SeqCst);

		tokio::time::sleep(std::time::Duration::from_secs(60)).await;

		assert_eq!(calls.load(Ordering::SeqCst), observed);
		assert!(observed <= 2);
	}

	#[tokio::test(start_paused = true)]
	async fn wrapped_operation_is_reusable() {
		let calls = AtomicU32::new(0);
		let op = RetryPolicy::new().with_max_attempts(2).wrap(|attempt: u32| {
			calls.fetch_add(1, Ordering::SeqCst);

			async move { if attempt == 1 { Err(upstream(500)) } else { Ok(attempt) } }
		});

		assert_eq!(op.call().await.expect("Second attempt should succeed."), 2);
		assert_eq!(op.call().await.expect("Second attempt should succeed."), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 4);
		assert_eq!(op.policy().max_attempts, 2);
	}
}
