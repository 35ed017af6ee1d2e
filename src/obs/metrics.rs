//! Metric names and the recorder calls behind them.
//!
//! Everything here is a no-op unless the `metrics` feature is enabled and the application has
//! installed a global recorder.

// self
use crate::{
	_prelude::*,
	obs::{RefreshScope, RefreshStage},
};

/// Counter incremented once per refresh stage, labeled by `scope` + `stage`.
pub const REFRESH_TOTAL: &str = "realtime_refresh_total";
/// Histogram of scheduled retry delays in seconds, labeled by `scope`.
pub const RETRY_DELAY_SECONDS: &str = "realtime_refresh_retry_delay_seconds";

/// Counts one occurrence of `stage` for `scope`.
pub fn record_refresh_metric(scope: RefreshScope, stage: RefreshStage) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(REFRESH_TOTAL, "scope" => scope.as_str(), "stage" => stage.as_str())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (scope, stage);
	}
}

/// Observes the backoff delay chosen for a retry.
pub fn record_retry_delay_metric(scope: RefreshScope, delay: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(RETRY_DELAY_SECONDS, "scope" => scope.as_str())
			.record(delay.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (scope, delay);
	}
}
