//! Refreshable tokens with redacted formatting and optional expiry hints.

// self
use crate::_prelude::*;

/// Token yielded by a provider, plus the expiry hint used to schedule the next refresh.
///
/// The value is shared, so clones handed to the transport do not copy it. Formatting never prints
/// the value, only its length.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
	value: Arc<str>,
	expires_at: Option<OffsetDateTime>,
}
impl Token {
	/// Creates a token without an expiry hint.
	pub fn new(value: impl Into<Arc<str>>) -> Self {
		Self { value: value.into(), expires_at: None }
	}

	/// Attaches an absolute expiry hint.
	pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
		self.expires_at = Some(expires_at);

		self
	}

	/// Attaches an optional expiry hint.
	pub fn with_expiry(mut self, expires_at: Option<OffsetDateTime>) -> Self {
		self.expires_at = expires_at;

		self
	}

	/// Returns the raw token string. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.value
	}

	/// Returns `true` when the provider handed back an empty value.
	pub fn is_empty(&self) -> bool {
		self.value.is_empty()
	}

	/// Returns the expiry hint, if the provider supplied one.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Returns `true` when the token carries an expiry at or before `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= instant)
	}

	/// Delay until a refresh should start, keeping `margin` ahead of expiry.
	///
	/// Returns `None` for tokens without an expiry hint; overdue tokens yield [`Duration::ZERO`].
	pub fn refresh_delay(&self, now: OffsetDateTime, margin: Duration) -> Option<Duration> {
		self.expires_at.map(|expires_at| refresh_delay(expires_at, now, margin))
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("value", &Redacted(self.value.len()))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

struct Redacted(usize);
impl Debug for Redacted {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "<{} bytes>", self.0)
	}
}

/// Time left before `expires_at - margin`, clamped at zero.
pub(crate) fn refresh_delay(
	expires_at: OffsetDateTime,
	now: OffsetDateTime,
	margin: Duration,
) -> Duration {
	let margin = time::Duration::try_from(margin).unwrap_or(time::Duration::MAX);
	let remaining = (expires_at - now).checked_sub(margin).unwrap_or(time::Duration::ZERO);

	Duration::try_from(remaining).unwrap_or(Duration::ZERO)
}
