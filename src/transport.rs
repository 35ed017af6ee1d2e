//! Transport contract used to apply refreshed tokens.
//!
//! The transport owns framing, keep-alive, and the wire protocol. This crate only needs three
//! operations from it: submit a refreshed connection token, resubmit a subscription with a
//! refreshed channel token, and start the transport's normal reconnect flow. Submission results
//! are classified by [`SubmitError`] so a server verdict on the token is never confused with a
//! broken link.

// self
use crate::{
	_prelude::*,
	auth::{ChannelName, Token},
};

/// Boxed future returned by token submissions.
pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SubmitError>> + 'a + Send>>;

/// Transport/connection layer consumed by the refresh state machines.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Applies a refreshed connection token; resolves once the server acknowledged it.
	fn submit_connection_token(&self, token: Token) -> SubmitFuture<'_>;

	/// Resubmits the subscription to `channel` carrying a refreshed token.
	fn submit_subscription_token(&self, channel: ChannelName, token: Token) -> SubmitFuture<'_>;

	/// Starts a fresh connection attempt through the transport's normal reconnect flow.
	fn reconnect(&self);
}

/// Failure reported while submitting a refreshed token.
#[derive(Debug, ThisError)]
pub enum SubmitError {
	/// The server refused the token (invalid, expired, or insufficient).
	#[error("Server rejected the refreshed token.")]
	Rejected(#[source] BoxError),
	/// The transport was already closed; the submission never left the client.
	#[error("Transport is closed.")]
	Closed,
	/// The transport broke while the submission was in flight.
	#[error("Transport failed while submitting the refreshed token.")]
	Failed(#[source] BoxError),
}
impl SubmitError {
	/// Wraps a server-side rejection cause.
	pub fn rejected(src: impl Into<BoxError>) -> Self {
		Self::Rejected(src.into())
	}

	/// Wraps a transport-level failure cause.
	pub fn failed(src: impl Into<BoxError>) -> Self {
		Self::Failed(src.into())
	}
}

/// Error reply returned by the server for a protocol command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Server error {code}: {message}.")]
pub struct ServerError {
	/// Protocol error code.
	pub code: u32,
	/// Human-readable message supplied by the server.
	pub message: String,
}
impl ServerError {
	/// Creates a new server error reply.
	pub fn new(code: u32, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}
}
