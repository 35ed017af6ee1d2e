//! Demonstrates a client whose connection token refresh first fails and is retried with backoff,
//! while one channel's refreshed token is rejected by the server and the channel is dropped.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};
// crates.io
use color_eyre::Result;
use time::OffsetDateTime;
// self
use realtime_refresh::{
	auth::{ChannelName, Token},
	client::Client,
	config::ClientConfig,
	connection::ConnectionState,
	error::{BoxError, Error},
	event::ClientEvent,
	provider::SubscriptionTokenContext,
	transport::{ServerError, SubmitError, SubmitFuture, Transport},
};

/// Acknowledges every token except those for `private`.
struct LoopbackTransport;
impl Transport for LoopbackTransport {
	fn submit_connection_token(&self, token: Token) -> SubmitFuture<'_> {
		println!("Transport applied connection token {token:?}.");

		Box::pin(async { Ok(()) })
	}

	fn submit_subscription_token(&self, channel: ChannelName, _: Token) -> SubmitFuture<'_> {
		Box::pin(async move {
			if channel.as_str() == "private" {
				Err(SubmitError::rejected(ServerError::new(40160, "channel denied")))
			} else {
				Ok(())
			}
		})
	}

	fn reconnect(&self) {
		println!("Transport reconnecting.");
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let attempts = Arc::new(AtomicU32::new(0));
	let connection_provider = {
		let attempts = attempts.clone();

		move || {
			let attempt = attempts.fetch_add(1, Ordering::SeqCst);

			async move {
				if attempt == 0 {
					Err::<Token, BoxError>("auth backend warming up".into())
				} else {
					Ok(Token::new(format!("connection-{attempt}")))
				}
			}
		}
	};
	let channel_provider = |context: SubscriptionTokenContext| async move {
		Ok::<_, BoxError>(Token::new(format!("channel-{}", context.channel)))
	};
	let config = ClientConfig::builder()
		.min_delay(Duration::from_millis(200))
		.max_delay(Duration::from_secs(2))
		.refresh_margin(Duration::from_secs(5))
		.build()?;
	let (client, mut events) =
		Client::spawn(config, Arc::new(connection_provider), Arc::new(LoopbackTransport))?;
	let news = ChannelName::new("news")?;
	let private = ChannelName::new("private")?;

	// The session token expires in six seconds, so a proactive refresh starts after one.
	client.on_connected(Some(OffsetDateTime::now_utc() + time::Duration::seconds(6))).await?;

	for channel in [&news, &private] {
		client.subscribe(channel.clone(), Arc::new(channel_provider)).await?;
		client.on_subscribed(channel.clone(), None).await?;
		client.refresh_subscription(channel.clone()).await?;
	}

	let mut refreshed = false;
	let mut rejected = false;

	while !(refreshed && rejected) {
		let Some(event) = tokio::time::timeout(Duration::from_secs(10), events.next()).await?
		else {
			break;
		};

		match event {
			ClientEvent::ConnectionState { from, to } => {
				println!("Connection {from} -> {to}.");

				refreshed |= from == ConnectionState::Refreshing && to == ConnectionState::Connected;
			},
			ClientEvent::SubscriptionState { channel, from, to } => {
				println!("Subscription `{channel}` {from} -> {to}.");
			},
			ClientEvent::RefreshRetrying { owner, attempt, delay } => {
				println!("Refresh of {owner} failed {attempt} time(s); retrying in {delay:?}.");
			},
			ClientEvent::Error(Error::SubscriptionRefresh(err)) => {
				println!("Subscription `{}` dropped: {}.", err.channel(), err.error());

				rejected = true;
			},
			ClientEvent::Error(err) => println!("Client error: {err}."),
		}
	}

	println!(
		"Connection refresh attempts: {}, successes: {}.",
		client.connection_metrics().attempts(),
		client.connection_metrics().successes()
	);

	client.close().await?;

	Ok(())
}
