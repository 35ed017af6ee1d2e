//! Notifications delivered to the embedding application.
//!
//! The stream is bounded. State changes and retry notices are dropped (and counted) while the
//! application is not keeping up; terminal errors always reach it.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::ChannelName,
	connection::ConnectionState,
	refresh::Owner,
	subscription::SubscriptionState,
};

/// Receiving half of the application event stream.
pub type EventReceiver = mpsc::Receiver<ClientEvent>;

/// Creates an application event stream buffering up to `capacity` notices.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
	let (tx, rx) = mpsc::channel(capacity.max(1));

	(EventSender { tx, dropped: Default::default() }, rx)
}

/// Sending half of the application event stream.
#[derive(Clone, Debug)]
pub struct EventSender {
	tx: mpsc::Sender<ClientEvent>,
	dropped: Arc<AtomicU64>,
}
impl EventSender {
	/// Number of notices dropped because the stream was full.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	pub(crate) fn dropped_counter(&self) -> Arc<AtomicU64> {
		self.dropped.clone()
	}
}

/// Lifecycle notifications emitted by a connection and its subscriptions.
#[derive(Debug)]
pub enum ClientEvent {
	/// The connection changed state.
	ConnectionState {
		/// Previous state.
		from: ConnectionState,
		/// New state.
		to: ConnectionState,
	},
	/// A subscription changed state.
	SubscriptionState {
		/// Channel of the subscription.
		channel: ChannelName,
		/// Previous state.
		from: SubscriptionState,
		/// New state.
		to: SubscriptionState,
	},
	/// A recoverable refresh failure; another attempt starts after `delay`.
	RefreshRetrying {
		/// Owner whose refresh failed.
		owner: Owner,
		/// Consecutive failures so far.
		attempt: u32,
		/// Delay before the next attempt.
		delay: Duration,
	},
	/// A terminal refresh failure carrying the original cause.
	Error(Error),
}
impl ClientEvent {
	/// Returns the wrapped error for [`ClientEvent::Error`].
	pub fn as_error(&self) -> Option<&Error> {
		match self {
			Self::Error(err) => Some(err),
			_ => None,
		}
	}
}

/// Emits `event` without blocking the caller, ignoring a closed application stream.
///
/// Errors that do not fit are handed to a task that waits for room; any other notice is dropped.
pub(crate) fn emit(events: &EventSender, event: ClientEvent) {
	match events.tx.try_send(event) {
		Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => (),
		Err(mpsc::error::TrySendError::Full(event @ ClientEvent::Error(_))) => {
			let tx = events.tx.clone();

			tokio::spawn(async move {
				let _ = tx.send(event).await;
			});
		},
		Err(mpsc::error::TrySendError::Full(event)) => {
			let dropped = events.dropped.fetch_add(1, Ordering::Relaxed) + 1;

			#[cfg(feature = "tracing")]
			tracing::warn!(total_dropped = dropped, ?event, "Event stream full; dropping notice.");
			#[cfg(not(feature = "tracing"))]
			let _ = (dropped, event);
		},
	}
}
