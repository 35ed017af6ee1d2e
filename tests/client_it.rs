mod common;

// std
use std::{sync::Arc, time::Duration};
// self
use common::{RecordingTransport, Reply, ScriptedProvider, channel, config};
use realtime_refresh::{
	client::{Client, ClientEvents},
	config::ClientConfig,
	connection::ConnectionState,
	error::{ConfigError, Error},
	event::ClientEvent,
	subscription::SubscriptionState,
	transport::{ServerError, SubmitError},
};

async fn wait_for(
	events: &mut ClientEvents,
	mut predicate: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
	tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			let event = events.next().await.expect("Client should still be running.");

			if predicate(&event) {
				return event;
			}
		}
	})
	.await
	.expect("Expected event should arrive in time.")
}

fn spawn(
	provider: &Arc<ScriptedProvider>,
	transport: &Arc<RecordingTransport>,
) -> (Client, ClientEvents) {
	Client::spawn(config(), provider.clone(), transport.clone()).expect("Client should start.")
}

#[tokio::test]
async fn connection_refresh_runs_end_to_end() {
	let provider = Arc::new(ScriptedProvider::new([Reply::Token("C1")]));
	let transport = Arc::new(RecordingTransport::default());
	let (client, mut events) = spawn(&provider, &transport);

	assert_eq!(client.connection_state(), ConnectionState::Connecting);

	client.on_connected(None).await.expect("Connecting should succeed.");

	assert_eq!(client.connection_state(), ConnectionState::Connected);

	let generation = client
		.refresh_connection()
		.await
		.expect("Refresh should be accepted.")
		.expect("A refresh should start.");

	assert_eq!(
		client.refresh_connection().await.expect("Refresh should be accepted."),
		Some(generation)
	);

	wait_for(&mut events, |event| {
		matches!(
			event,
			ClientEvent::ConnectionState {
				from: ConnectionState::Refreshing,
				to: ConnectionState::Connected,
			}
		)
	})
	.await;

	assert_eq!(client.connection_state(), ConnectionState::Connected);
	assert_eq!(transport.tokens(), vec!["C1".to_string()]);
	assert_eq!(client.connection_metrics().successes(), 1);
	assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn rejected_subscription_is_removed_and_reported_once() {
	let provider = Arc::new(ScriptedProvider::default());
	let subscription_provider = Arc::new(ScriptedProvider::new([Reply::Token("S1")]));
	let transport = Arc::new(RecordingTransport::with_results([Err(SubmitError::rejected(
		ServerError::new(40160, "channel denied"),
	))]));
	let (client, mut events) = spawn(&provider, &transport);
	let news = channel("news");

	client.on_connected(None).await.expect("Connecting should succeed.");
	client
		.subscribe(news.clone(), subscription_provider.clone())
		.await
		.expect("Subscribing should succeed.");

	assert_eq!(client.subscription_state(&news), Some(SubscriptionState::Subscribing));

	client.on_subscribed(news.clone(), None).await.expect("Confirmation should succeed.");

	assert_eq!(client.subscription_state(&news), Some(SubscriptionState::Subscribed));

	client.refresh_subscription(news.clone()).await.expect("Refresh should be accepted.");

	let event = wait_for(&mut events, |event| event.as_error().is_some()).await;
	let Some(Error::SubscriptionRefresh(err)) = event.as_error() else {
		panic!("Expected a subscription refresh error, got {event:?}.");
	};

	assert_eq!(err.channel(), &news);
	assert_eq!(client.subscription_state(&news), None);
	assert_eq!(client.connection_state(), ConnectionState::Connected);
	assert!(matches!(
		client.refresh_subscription(news.clone()).await,
		Err(Error::NotSubscribed { .. })
	));

	tokio::task::yield_now().await;

	assert!(events.try_next().is_none_or(|event| event.as_error().is_none()));

	client
		.subscribe(news.clone(), subscription_provider)
		.await
		.expect("The channel may be subscribed again.");
}

#[tokio::test]
async fn duplicate_subscriptions_are_refused() {
	let provider = Arc::new(ScriptedProvider::default());
	let transport = Arc::new(RecordingTransport::default());
	let (client, _events) = spawn(&provider, &transport);
	let news = channel("news");

	client.subscribe(news.clone(), provider.clone()).await.expect("Subscribing should succeed.");

	assert!(matches!(
		client.subscribe(news.clone(), provider.clone()).await,
		Err(Error::AlreadySubscribed { channel }) if channel == news
	));
	assert!(matches!(
		client.on_subscribed(channel("sports"), None).await,
		Err(Error::NotSubscribed { .. })
	));
}

#[tokio::test]
async fn close_tears_down_connection_and_subscriptions() {
	let provider = Arc::new(ScriptedProvider::default());
	let transport = Arc::new(RecordingTransport::default());
	let (client, mut events) = spawn(&provider, &transport);
	let news = channel("news");

	client.on_connected(None).await.expect("Connecting should succeed.");
	client.subscribe(news.clone(), provider.clone()).await.expect("Subscribing should succeed.");
	client.on_subscribed(news.clone(), None).await.expect("Confirmation should succeed.");
	client.close().await.expect("Closing should succeed.");

	assert_eq!(client.connection_state(), ConnectionState::Closed);
	assert_eq!(client.subscription_state(&news), None);
	assert!(matches!(client.refresh_connection().await, Err(Error::Closed)));
	assert!(matches!(client.on_connected(None).await, Err(Error::Closed)));
	assert!(matches!(client.subscribe(news.clone(), provider.clone()).await, Err(Error::Closed)));

	wait_for(&mut events, |event| {
		matches!(
			event,
			ClientEvent::SubscriptionState { to: SubscriptionState::Unsubscribed, .. }
		)
	})
	.await;
	wait_for(&mut events, |event| {
		matches!(event, ClientEvent::ConnectionState { to: ConnectionState::Closed, .. })
	})
	.await;
}

#[tokio::test]
async fn dropping_every_handle_ends_the_event_stream() {
	let provider = Arc::new(ScriptedProvider::default());
	let transport = Arc::new(RecordingTransport::default());
	let (client, mut events) = spawn(&provider, &transport);

	client.on_connected(None).await.expect("Connecting should succeed.");

	drop(client);

	let drained = tokio::time::timeout(Duration::from_secs(5), async {
		let mut drained = Vec::new();

		while let Some(event) = events.next().await {
			drained.push(event);
		}

		drained
	})
	.await
	.expect("Event stream should end once the client stops.");

	assert!(drained.iter().any(|event| matches!(
		event,
		ClientEvent::ConnectionState { to: ConnectionState::Closed, .. }
	)));
}

#[tokio::test]
async fn slow_event_reader_does_not_stall_the_client() {
	let provider = Arc::new(ScriptedProvider::new([Reply::Token("C1")]));
	let transport = Arc::new(RecordingTransport::default());
	let (client, mut events) = Client::spawn(
		ClientConfig { event_capacity: 1, ..config() },
		provider.clone(),
		transport.clone(),
	)
	.expect("Client should start.");
	let news = channel("news");

	client.on_connected(None).await.expect("Connecting should succeed.");
	client.subscribe(news.clone(), provider.clone()).await.expect("Subscribing should succeed.");
	client.on_subscribed(news.clone(), None).await.expect("Confirmation should succeed.");
	client.refresh_connection().await.expect("Refresh should be accepted.");

	tokio::time::timeout(Duration::from_secs(5), async {
		while client.connection_state() != ConnectionState::Connected {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("Refresh should finish while nobody reads the event stream.");

	assert_eq!(transport.tokens(), vec!["C1".to_string()]);
	assert_eq!(client.subscription_state(&news), Some(SubscriptionState::Subscribed));
	assert!(events.dropped() >= 3);
	assert!(matches!(
		events.try_next(),
		Some(ClientEvent::ConnectionState {
			from: ConnectionState::Connecting,
			to: ConnectionState::Connected,
		})
	));
}

#[tokio::test]
async fn invalid_configuration_is_rejected_before_spawning() {
	let provider = Arc::new(ScriptedProvider::default());
	let transport = Arc::new(RecordingTransport::default());
	let result = Client::spawn(
		ClientConfig { provider_timeout: Some(Duration::ZERO), ..config() },
		provider,
		transport,
	);

	assert!(matches!(result, Err(Error::Config(ConfigError::ZeroProviderTimeout))));

	let result = Client::spawn(
		ClientConfig { event_capacity: 0, ..config() },
		Arc::new(ScriptedProvider::default()),
		Arc::new(RecordingTransport::default()),
	);

	assert!(matches!(result, Err(Error::Config(ConfigError::ZeroEventCapacity))));
}
