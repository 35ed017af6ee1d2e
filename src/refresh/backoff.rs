// self
use crate::{_prelude::*, config::BackoffConfig};

/// Tracks consecutive recoverable failures and hands out non-decreasing retry delays.
#[derive(Clone, Debug)]
pub struct Backoff {
	config: BackoffConfig,
	failures: u32,
	last: Duration,
}
impl Backoff {
	/// Creates a tracker for the provided policy.
	pub fn new(config: BackoffConfig) -> Self {
		Self { config, failures: 0, last: Duration::ZERO }
	}

	/// Registers one more failure and returns the delay before the next attempt.
	pub fn next_delay(&mut self) -> Duration {
		self.failures = self.failures.saturating_add(1);

		let delay = self.config.delay(self.failures, rand::random::<f64>()).max(self.last);

		self.last = delay;

		delay
	}

	/// Number of consecutive failures since the last reset.
	pub fn failures(&self) -> u32 {
		self.failures
	}

	/// Clears the failure streak after a successful refresh.
	pub fn reset(&mut self) {
		self.failures = 0;
		self.last = Duration::ZERO;
	}
}
