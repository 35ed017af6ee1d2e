//! Optional observability helpers for refresh flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to instrument provider calls with spans named
//!   `realtime_refresh.refresh` carrying the `scope` and `owner` fields, and to log every refresh
//!   stage as a structured event.
//! - Enable `metrics` to increment the `realtime_refresh_total` counter for every stage, labeled by
//!   `scope` + `stage`, and to record every scheduled retry delay in the
//!   `realtime_refresh_retry_delay_seconds` histogram, labeled by `scope`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, refresh::Generation};

/// Which kind of owner a refresh belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshScope {
	/// Connection-level token refresh.
	Connection,
	/// Channel-level subscription token refresh.
	Subscription,
}
impl RefreshScope {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshScope::Connection => "connection",
			RefreshScope::Subscription => "subscription",
		}
	}
}
impl Display for RefreshScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Stage labels recorded while a refresh progresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshStage {
	/// A provider call was started.
	Attempt,
	/// The refreshed token was acknowledged.
	Success,
	/// The provider call failed.
	ProviderFailure,
	/// The server rejected the refreshed token.
	ServerRejected,
	/// The transport broke while submitting the token.
	TransportFailure,
	/// A retry was scheduled after a recoverable failure.
	Retry,
	/// A completion from a superseded generation was dropped.
	Stale,
}
impl RefreshStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshStage::Attempt => "attempt",
			RefreshStage::Success => "success",
			RefreshStage::ProviderFailure => "provider_failure",
			RefreshStage::ServerRejected => "server_rejected",
			RefreshStage::TransportFailure => "transport_failure",
			RefreshStage::Retry => "retry",
			RefreshStage::Stale => "stale",
		}
	}
}
impl Display for RefreshStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records a refresh stage through every enabled backend.
pub fn record_refresh(scope: RefreshScope, owner: &str, stage: RefreshStage, generation: Generation) {
	record_refresh_metric(scope, stage);
	log_refresh(scope, owner, stage, generation, None);
}

/// Records a failed refresh stage together with its cause.
pub fn record_refresh_failure(
	scope: RefreshScope,
	owner: &str,
	stage: RefreshStage,
	generation: Generation,
	cause: &(dyn StdError + 'static),
) {
	record_refresh_metric(scope, stage);
	log_refresh(scope, owner, stage, generation, Some(cause));
}

/// Records a scheduled retry and the backoff delay chosen for it.
pub fn record_retry(scope: RefreshScope, owner: &str, generation: Generation, delay: Duration) {
	record_retry_delay_metric(scope, delay);
	record_refresh(scope, owner, RefreshStage::Retry, generation);
}
