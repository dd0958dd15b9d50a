//! Retry budget and delay computation for transient failures.
//!
//! The policy is a pure function of the attempt number, the upstream Retry-After hint, and
//! a jitter sample, so schedules can be asserted without sleeping.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Bounded exponential backoff with additive jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts per logical call, including the first.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles for every further attempt.
	pub base_delay: StdDuration,
	/// Exclusive upper bound of the random jitter added to each backoff delay.
	pub max_jitter: StdDuration,
}
impl RetryPolicy {
	/// Default number of attempts per call.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
	/// Default backoff base.
	pub const DEFAULT_BASE_DELAY: StdDuration = StdDuration::from_millis(300);
	/// Default jitter bound.
	pub const DEFAULT_MAX_JITTER: StdDuration = StdDuration::from_millis(200);
	const MAX_EXPONENT: u32 = 16;

	/// Overrides the attempt ceiling.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Overrides the backoff base.
	pub fn with_base_delay(mut self, base_delay: StdDuration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Overrides the jitter bound; zero disables jitter.
	pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
		self.max_jitter = max_jitter;

		self
	}

	/// Exponential component for the retry that follows `attempt` (1-based).
	pub fn backoff(&self, attempt: u32) -> StdDuration {
		let exponent = attempt.saturating_sub(1).min(Self::MAX_EXPONENT);

		self.base_delay.saturating_mul(1 << exponent)
	}

	/// Delay before the next attempt given an explicit jitter sample.
	///
	/// A non-zero Retry-After hint wins over the exponential schedule and is used verbatim.
	pub fn delay_with_jitter(&self, context: &RetryContext, jitter: StdDuration) -> StdDuration {
		match context.retry_after {
			Some(hint) if !hint.is_zero() => hint,
			_ => self.backoff(context.attempt).saturating_add(jitter),
		}
	}

	/// Delay before the next attempt, sampling jitter from `rng`.
	pub fn delay<R>(&self, context: &RetryContext, rng: &mut R) -> StdDuration
	where
		R: Rng,
	{
		self.delay_with_jitter(context, self.sample_jitter(rng))
	}

	fn sample_jitter<R>(&self, rng: &mut R) -> StdDuration
	where
		R: Rng,
	{
		let bound = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);

		if bound == 0 {
			return StdDuration::ZERO;
		}

		StdDuration::from_millis(rng.random_range(0..bound))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: Self::DEFAULT_BASE_DELAY,
			max_jitter: Self::DEFAULT_MAX_JITTER,
		}
	}
}

/// Per-call retry state; discarded once the call succeeds or fails terminally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryContext {
	/// Attempt currently in progress (1-based).
	pub attempt: u32,
	/// Attempt ceiling copied from the policy.
	pub max_attempts: u32,
	/// Retry-After hint from the most recent failed attempt.
	pub retry_after: Option<StdDuration>,
}
impl RetryContext {
	/// Starts at attempt 1.
	pub fn new(max_attempts: u32) -> Self {
		Self { attempt: 1, max_attempts, retry_after: None }
	}

	/// Returns `true` while another attempt fits in the budget.
	pub fn has_remaining(&self) -> bool {
		self.attempt < self.max_attempts
	}

	/// Records the hint carried by the failure of the current attempt.
	pub fn record_failure(&mut self, retry_after: Option<StdDuration>) {
		self.retry_after = retry_after;
	}

	/// Moves to the next attempt and clears the previous hint.
	pub fn advance(&mut self) {
		self.attempt += 1;
		self.retry_after = None;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ms(value: u64) -> StdDuration {
		StdDuration::from_millis(value)
	}

	#[test]
	fn backoff_doubles_from_base() {
		let policy = RetryPolicy::default();
		let schedule: Vec<_> = (1..=4).map(|attempt| policy.backoff(attempt)).collect();

		assert_eq!(schedule, vec![ms(300), ms(600), ms(1_200), ms(2_400)]);
		assert_eq!(policy.backoff(u32::MAX), ms(300).saturating_mul(1 << 16));
	}

	#[test]
	fn jitter_stays_inside_bounds() {
		let policy = RetryPolicy::default();
		let mut rng = rand::rng();

		for attempt in 1..=4 {
			let context = RetryContext { attempt, max_attempts: 5, retry_after: None };

			for _ in 0..64 {
				let delay = policy.delay(&context, &mut rng);
				let floor = policy.backoff(attempt);

				assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
				assert!(delay < floor + ms(200), "attempt {attempt}: {delay:?} too long");
			}
		}
	}

	#[test]
	fn retry_after_wins_over_backoff() {
		let policy = RetryPolicy::default();
		let mut context = RetryContext::new(5);

		context.advance();
		context.advance();
		context.record_failure(Some(StdDuration::from_secs(2)));

		assert_eq!(policy.delay_with_jitter(&context, ms(150)), StdDuration::from_secs(2));
	}

	#[test]
	fn zero_retry_after_falls_back_to_backoff() {
		let policy = RetryPolicy::default();
		let mut context = RetryContext::new(5);

		context.record_failure(Some(StdDuration::ZERO));

		assert_eq!(policy.delay_with_jitter(&context, ms(42)), ms(342));
	}

	#[test]
	fn zero_jitter_bound_is_deterministic() {
		let policy = RetryPolicy::default().with_max_jitter(StdDuration::ZERO);
		let context = RetryContext { attempt: 3, max_attempts: 5, retry_after: None };

		assert_eq!(policy.delay(&context, &mut rand::rng()), ms(1_200));
	}

	#[test]
	fn context_budget_counts_attempts() {
		let mut context = RetryContext::new(5);
		let mut retries = 0;

		context.record_failure(Some(ms(10)));

		while context.has_remaining() {
			context.advance();
			retries += 1;
		}

		assert_eq!(retries, 4);
		assert_eq!(context.attempt, 5);
		assert_eq!(context.retry_after, None);
		assert!(!RetryContext::new(1).has_remaining());
	}
}
