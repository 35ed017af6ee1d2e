//! Token provider contracts supplied by the embedding application.
//!
//! Providers are opaque async functions: the client never learns how a token is obtained, it only
//! observes whether the call resolved with a [`Token`] or failed with a cause. Implementations may
//! fail, hang, or race with teardown; the refreshers bound them with the configured timeout and
//! discard their results once superseded.

// self
use crate::{
	_prelude::*,
	auth::{ChannelName, Token},
};

/// Boxed future returned by token providers.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token, BoxError>> + 'a + Send>>;

/// Supplies connection-level tokens.
///
/// Closures returning `'static` futures implement this trait automatically:
///
/// ```
/// use realtime_refresh::{auth::Token, error::BoxError, provider::ConnectionTokenProvider};
///
/// fn assert_provider(_: &impl ConnectionTokenProvider) {}
///
/// assert_provider(&|| async { Ok::<_, BoxError>(Token::new("connection-token")) });
/// ```
pub trait ConnectionTokenProvider
where
	Self: Send + Sync,
{
	/// Fetches a fresh connection token.
	fn connection_token(&self) -> TokenFuture<'_>;
}
impl<F, Fut> ConnectionTokenProvider for F
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<Token, BoxError>>,
{
	fn connection_token(&self) -> TokenFuture<'_> {
		Box::pin(self())
	}
}

/// Input handed to a [`SubscriptionTokenProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionTokenContext {
	/// Channel the token must authorize.
	pub channel: ChannelName,
}
impl SubscriptionTokenContext {
	/// Creates a context for `channel`.
	pub fn new(channel: ChannelName) -> Self {
		Self { channel }
	}
}

/// Supplies channel-level subscription tokens.
pub trait SubscriptionTokenProvider
where
	Self: Send + Sync,
{
	/// Fetches a fresh token for the channel named in `context`.
	fn subscription_token(&self, context: SubscriptionTokenContext) -> TokenFuture<'_>;
}
impl<F, Fut> SubscriptionTokenProvider for F
where
	F: Send + Sync + Fn(SubscriptionTokenContext) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Token, BoxError>>,
{
	fn subscription_token(&self, context: SubscriptionTokenContext) -> TokenFuture<'_> {
		Box::pin(self(context))
	}
}
