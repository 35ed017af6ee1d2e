// std
use std::ops::{Deref, DerefMut};
// self
use crate::{
	_prelude::*,
	auth::ChannelName,
	provider::{ConnectionTokenProvider, SubscriptionTokenContext, SubscriptionTokenProvider},
	refresh::{CompletionSender, Generation, Owner, Refresher},
};

/// Mediates the single connection-level refresh in flight.
#[derive(Debug)]
pub struct ConnectionTokenRefresher(Refresher);
impl ConnectionTokenRefresher {
	/// Creates an idle refresher for the connection.
	pub fn new(completions: CompletionSender, provider_timeout: Option<Duration>) -> Self {
		Self(Refresher::new(Owner::Connection, completions, provider_timeout))
	}

	/// Calls `provider` asynchronously and returns the new attempt's generation.
	///
	/// Returns immediately; the result arrives on the completion queue.
	pub fn start(&mut self, provider: Arc<dyn ConnectionTokenProvider>) -> Generation {
		self.0.begin(async move { provider.connection_token().await })
	}
}
impl Deref for ConnectionTokenRefresher {
	type Target = Refresher;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl DerefMut for ConnectionTokenRefresher {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

/// Mediates the single refresh in flight for one channel's subscription.
#[derive(Debug)]
pub struct SubscriptionTokenRefresher {
	channel: ChannelName,
	inner: Refresher,
}
impl SubscriptionTokenRefresher {
	/// Creates an idle refresher for `channel`.
	pub fn new(
		channel: ChannelName,
		completions: CompletionSender,
		provider_timeout: Option<Duration>,
	) -> Self {
		let inner = Refresher::new(Owner::Subscription(channel.clone()), completions, provider_timeout);

		Self { channel, inner }
	}

	/// Channel this refresher is scoped to.
	pub fn channel(&self) -> &ChannelName {
		&self.channel
	}

	/// Calls `provider` for this channel asynchronously and returns the new attempt's generation.
	pub fn start(&mut self, provider: Arc<dyn SubscriptionTokenProvider>) -> Generation {
		let context = SubscriptionTokenContext::new(self.channel.clone());

		self.inner.begin(async move { provider.subscription_token(context).await })
	}
}
impl Deref for SubscriptionTokenRefresher {
	type Target = Refresher;

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}
impl DerefMut for SubscriptionTokenRefresher {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.inner
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::Token,
		refresh::{RefreshOutcome, Step, completion_channel},
	};

	#[tokio::test]
	async fn subscription_provider_receives_its_channel() {
		let (tx, mut rx) = completion_channel();
		let channel = ChannelName::new("news").expect("Channel fixture should be valid.");
		let mut refresher = SubscriptionTokenRefresher::new(channel.clone(), tx, None);
		let provider: Arc<dyn SubscriptionTokenProvider> =
			Arc::new(|context: SubscriptionTokenContext| async move {
				Ok::<_, BoxError>(Token::new(format!("token-for-{}", context.channel)))
			});
		let generation = refresher.start(provider);
		let envelope = rx.recv().await.expect("Completion should be delivered.");

		assert_eq!(envelope.owner, Owner::Subscription(channel));
		assert_eq!(envelope.completion.generation, generation);
		assert!(matches!(
			envelope.completion.step,
			Step::Fetched(RefreshOutcome::Success(ref token)) if token.expose() == "token-for-news"
		));
	}

	#[tokio::test]
	async fn restarting_supersedes_the_previous_attempt() {
		let (tx, mut rx) = completion_channel();
		let mut refresher = ConnectionTokenRefresher::new(tx, None);
		let provider: Arc<dyn ConnectionTokenProvider> =
			Arc::new(|| async { Ok::<_, BoxError>(Token::new("fresh")) });
		let first = refresher.start(provider.clone());
		let second = refresher.start(provider);

		assert!(second > first);

		let envelope = rx.recv().await.expect("Latest attempt should deliver.");

		assert_eq!(envelope.completion.generation, second);
		assert!(refresher.is_current(envelope.completion.generation));
	}
}
