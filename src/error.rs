//! Client-level error types shared by the connection, subscription, and refresh layers.

// self
use crate::{
	_prelude::*,
	auth::{ChannelName, ChannelNameError},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed cause carried through refresh failures without modification.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs and the client event stream.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Connection token refresh failed terminally.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Subscription token refresh failed terminally.
	#[error(transparent)]
	SubscriptionRefresh(#[from] SubscriptionRefreshError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Channel name failed validation.
	#[error(transparent)]
	Channel(#[from] ChannelNameError),

	/// The connection was closed and accepts no further refreshes.
	#[error("Connection is closed.")]
	Closed,
	/// No live subscription exists for the channel.
	#[error("Channel `{channel}` has no active subscription.")]
	NotSubscribed {
		/// Channel the caller referenced.
		channel: ChannelName,
	},
	/// A live subscription already exists for the channel.
	#[error("Channel `{channel}` is already subscribed.")]
	AlreadySubscribed {
		/// Channel the caller referenced.
		channel: ChannelName,
	},
	/// The client event loop has stopped.
	#[error("Client event loop has stopped.")]
	Shutdown,
}

/// Terminal failure of a connection-level token refresh.
///
/// The wrapped cause is the provider or transport error exactly as it was produced.
#[derive(Debug, ThisError)]
#[error("Connection token refresh failed.")]
pub struct TokenError {
	#[source]
	source: BoxError,
}
impl TokenError {
	/// Wraps the underlying refresh cause.
	pub fn new(source: impl Into<BoxError>) -> Self {
		Self { source: source.into() }
	}

	/// Returns the underlying cause.
	pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
		self.source.as_ref()
	}

	/// Consumes the wrapper and returns the underlying cause.
	pub fn into_inner(self) -> BoxError {
		self.source
	}
}

/// Terminal failure of a subscription-level token refresh.
#[derive(Debug, ThisError)]
#[error("Subscription token refresh for `{channel}` failed.")]
pub struct SubscriptionRefreshError {
	channel: ChannelName,
	#[source]
	source: BoxError,
}
impl SubscriptionRefreshError {
	/// Wraps the underlying refresh cause for `channel`.
	pub fn new(channel: ChannelName, source: impl Into<BoxError>) -> Self {
		Self { channel, source: source.into() }
	}

	/// Channel whose subscription refresh failed.
	pub fn channel(&self) -> &ChannelName {
		&self.channel
	}

	/// Returns the underlying cause.
	pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
		self.source.as_ref()
	}

	/// Consumes the wrapper and returns the underlying cause.
	pub fn into_inner(self) -> BoxError {
		self.source
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConfigError {
	/// Backoff must start from a positive delay.
	#[error("Backoff minimum delay must be positive.")]
	ZeroMinDelay,
	/// Backoff cap is lower than its starting delay.
	#[error("Backoff maximum delay {max:?} is below the minimum delay {min:?}.")]
	MaxBelowMin {
		/// Configured minimum delay.
		min: Duration,
		/// Configured maximum delay.
		max: Duration,
	},
	/// Jitter ratio outside `[0, 1)`.
	#[error("Backoff jitter must be within [0, 1), got {jitter}.")]
	InvalidJitter {
		/// Rejected jitter ratio.
		jitter: f64,
	},
	/// Provider timeout was set to zero.
	#[error("Provider timeout must be positive.")]
	ZeroProviderTimeout,
	/// Event stream capacity was set to zero.
	#[error("Event stream capacity must be positive.")]
	ZeroEventCapacity,
}
