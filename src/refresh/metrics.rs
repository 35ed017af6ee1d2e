// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one owner's refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	provider_failures: AtomicU64,
	rejections: AtomicU64,
	transport_failures: AtomicU64,
	retries: AtomicU64,
	stale: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of provider calls started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshed tokens the server acknowledged.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed provider calls.
	pub fn provider_failures(&self) -> u64 {
		self.provider_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshed tokens the server rejected.
	pub fn rejections(&self) -> u64 {
		self.rejections.load(Ordering::Relaxed)
	}

	/// Returns the number of submissions lost to transport failures.
	pub fn transport_failures(&self) -> u64 {
		self.transport_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of retries scheduled after recoverable failures.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of completions dropped as stale.
	pub fn stale(&self) -> u64 {
		self.stale.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_provider_failure(&self) {
		self.provider_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejection(&self) {
		self.rejections.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_transport_failure(&self) {
		self.transport_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_stale(&self) {
		self.stale.fetch_add(1, Ordering::Relaxed);
	}
}
