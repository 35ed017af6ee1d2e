//! Client configuration: backoff policy, provider timeout, proactive refresh margin, and event
//! stream capacity.

// self
use crate::{_prelude::*, error::ConfigError};

/// Exponential backoff policy applied to recoverable refresh failures.
///
/// The delay for the `n`-th consecutive failure is
/// `min(max_delay, base + rand[0, jitter * base))` with `base = min_delay * 2^(n-1)`, so delays
/// grow strictly until they reach the cap and stay there.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
	/// Delay before the first retry.
	pub min_delay: Duration,
	/// Upper bound for every retry delay.
	pub max_delay: Duration,
	/// Jitter ratio in `[0, 1)` applied on top of the exponential base.
	pub jitter: f64,
}
impl BackoffConfig {
	const DEFAULT_JITTER: f64 = 0.5;
	const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(20);
	const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);

	/// Checks the policy for values that would break delay monotonicity.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.min_delay.is_zero() {
			return Err(ConfigError::ZeroMinDelay);
		}
		if self.max_delay < self.min_delay {
			return Err(ConfigError::MaxBelowMin { min: self.min_delay, max: self.max_delay });
		}
		if !(0.0..1.0).contains(&self.jitter) {
			return Err(ConfigError::InvalidJitter { jitter: self.jitter });
		}

		Ok(())
	}

	/// Delay for the `attempt`-th consecutive failure given a uniform `sample` in `[0, 1)`.
	pub fn delay(&self, attempt: u32, sample: f64) -> Duration {
		let exp = attempt.saturating_sub(1).min(31);
		let base = self.min_delay.saturating_mul(1_u32 << exp).min(self.max_delay);
		let extra =
			Duration::try_from_secs_f64(base.as_secs_f64() * self.jitter * sample.clamp(0.0, 1.0))
				.unwrap_or(Duration::ZERO);

		base.saturating_add(extra).min(self.max_delay)
	}
}
impl Default for BackoffConfig {
	fn default() -> Self {
		Self {
			min_delay: Self::DEFAULT_MIN_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
			jitter: Self::DEFAULT_JITTER,
		}
	}
}

/// Settings shared by the connection and every subscription of a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Retry policy for provider and transport failures.
	pub backoff: BackoffConfig,
	/// Upper bound for a single provider call; `None` waits until cancelled.
	pub provider_timeout: Option<Duration>,
	/// How long before a token's expiry hint the proactive refresh starts.
	pub refresh_margin: Duration,
	/// Notices buffered for the application before state changes and retry notices are dropped.
	pub event_capacity: usize,
}
impl ClientConfig {
	const DEFAULT_EVENT_CAPACITY: usize = 256;
	const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
	const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5);

	/// Returns a builder seeded with the defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Validates every section of the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.backoff.validate()?;

		if self.provider_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(ConfigError::ZeroProviderTimeout);
		}
		if self.event_capacity == 0 {
			return Err(ConfigError::ZeroEventCapacity);
		}

		Ok(())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			backoff: BackoffConfig::default(),
			provider_timeout: Some(Self::DEFAULT_PROVIDER_TIMEOUT),
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			event_capacity: Self::DEFAULT_EVENT_CAPACITY,
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	/// Overrides the whole backoff policy.
	pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
		self.config.backoff = backoff;

		self
	}

	/// Overrides the first retry delay.
	pub fn min_delay(mut self, delay: Duration) -> Self {
		self.config.backoff.min_delay = delay;

		self
	}

	/// Overrides the retry delay cap.
	pub fn max_delay(mut self, delay: Duration) -> Self {
		self.config.backoff.max_delay = delay;

		self
	}

	/// Overrides the jitter ratio.
	pub fn jitter(mut self, jitter: f64) -> Self {
		self.config.backoff.jitter = jitter;

		self
	}

	/// Bounds every provider call; pass `None` to wait until cancellation.
	pub fn provider_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.config.provider_timeout = timeout;

		self
	}

	/// Overrides the proactive refresh margin.
	pub fn refresh_margin(mut self, margin: Duration) -> Self {
		self.config.refresh_margin = margin;

		self
	}

	/// Overrides how many notices the event stream buffers.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.config.event_capacity = capacity;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}
