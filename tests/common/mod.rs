#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::oneshot;
// self
use realtime_refresh::{
	auth::{ChannelName, Token},
	config::{BackoffConfig, ClientConfig},
	connection::Connection,
	error::BoxError,
	event::{ClientEvent, EventReceiver, event_channel},
	provider::{
		ConnectionTokenProvider, SubscriptionTokenContext, SubscriptionTokenProvider, TokenFuture,
	},
	refresh::{CompletionReceiver, Envelope, completion_channel},
	subscription::Subscription,
	transport::{SubmitError, SubmitFuture, Transport},
};

/// Scripted provider reply, consumed in order.
pub enum Reply {
	Token(&'static str),
	Expiring(&'static str, OffsetDateTime),
	Fail(&'static str),
	Gated(oneshot::Receiver<Result<Token, BoxError>>),
}

/// Creates a reply that resolves once the returned sender fires.
pub fn gated() -> (Reply, oneshot::Sender<Result<Token, BoxError>>) {
	let (tx, rx) = oneshot::channel();

	(Reply::Gated(rx), tx)
}

/// Provider that replays a fixed script and hangs once it runs out.
#[derive(Default)]
pub struct ScriptedProvider {
	replies: Mutex<VecDeque<Reply>>,
	calls: AtomicUsize,
	channels: Mutex<Vec<String>>,
}
impl ScriptedProvider {
	pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
		Self { replies: Mutex::new(replies.into_iter().collect()), ..Default::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn channels(&self) -> Vec<String> {
		self.channels.lock().clone()
	}

	fn next(&self) -> TokenFuture<'static> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self.replies.lock().pop_front();

		Box::pin(async move {
			match reply {
				Some(Reply::Token(value)) => Ok(Token::new(value)),
				Some(Reply::Expiring(value, expires_at)) =>
					Ok(Token::new(value).with_expires_at(expires_at)),
				Some(Reply::Fail(message)) => Err(message.into()),
				Some(Reply::Gated(rx)) => match rx.await {
					Ok(result) => result,
					Err(_) => std::future::pending().await,
				},
				None => std::future::pending().await,
			}
		})
	}
}
impl ConnectionTokenProvider for ScriptedProvider {
	fn connection_token(&self) -> TokenFuture<'_> {
		self.next()
	}
}
impl SubscriptionTokenProvider for ScriptedProvider {
	fn subscription_token(&self, context: SubscriptionTokenContext) -> TokenFuture<'_> {
		self.channels.lock().push(context.channel.to_string());

		self.next()
	}
}

/// One token handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
	pub channel: Option<String>,
	pub token: String,
}

/// Transport that records submissions and answers from a script (acknowledging by default).
#[derive(Default)]
pub struct RecordingTransport {
	submissions: Mutex<Vec<Submission>>,
	results: Mutex<VecDeque<Result<(), SubmitError>>>,
	reconnects: AtomicUsize,
}
impl RecordingTransport {
	pub fn with_results(results: impl IntoIterator<Item = Result<(), SubmitError>>) -> Self {
		Self { results: Mutex::new(results.into_iter().collect()), ..Default::default() }
	}

	pub fn submissions(&self) -> Vec<Submission> {
		self.submissions.lock().clone()
	}

	pub fn tokens(&self) -> Vec<String> {
		self.submissions.lock().iter().map(|submission| submission.token.clone()).collect()
	}

	pub fn reconnects(&self) -> usize {
		self.reconnects.load(Ordering::SeqCst)
	}

	fn record(&self, channel: Option<String>, token: Token) -> SubmitFuture<'static> {
		self.submissions.lock().push(Submission { channel, token: token.expose().to_owned() });

		let result = self.results.lock().pop_front().unwrap_or(Ok(()));

		Box::pin(async move { result })
	}
}
impl Transport for RecordingTransport {
	fn submit_connection_token(&self, token: Token) -> SubmitFuture<'_> {
		self.record(None, token)
	}

	fn submit_subscription_token(&self, channel: ChannelName, token: Token) -> SubmitFuture<'_> {
		self.record(Some(channel.to_string()), token)
	}

	fn reconnect(&self) {
		self.reconnects.fetch_add(1, Ordering::SeqCst);
	}
}

/// Configuration with short delays and no provider timeout.
pub fn config() -> ClientConfig {
	ClientConfig::builder()
		.backoff(BackoffConfig {
			min_delay: Duration::from_millis(100),
			max_delay: Duration::from_secs(1),
			jitter: 0.5,
		})
		.provider_timeout(None)
		.refresh_margin(Duration::from_secs(5))
		.build()
		.expect("Test configuration should validate.")
}

pub fn channel(name: &str) -> ChannelName {
	ChannelName::new(name).expect("Channel fixture should be valid.")
}

/// Yields until the provider has been called `calls` times.
pub async fn wait_for_calls(provider: &ScriptedProvider, calls: usize) {
	for _ in 0..1_000 {
		if provider.calls() >= calls {
			return;
		}

		tokio::task::yield_now().await;
	}

	panic!("Provider should have been called {calls} times, got {}.", provider.calls());
}

async fn next_envelope(completions: &mut CompletionReceiver) -> Envelope {
	tokio::time::timeout(Duration::from_secs(60), completions.recv())
		.await
		.expect("A completion should arrive in time.")
		.expect("Completion queue should stay open.")
}

fn drain(events: &mut EventReceiver) -> Vec<ClientEvent> {
	let mut drained = Vec::new();

	while let Ok(event) = events.try_recv() {
		drained.push(event);
	}

	drained
}

/// Connection wired to a scripted provider and recording transport, pumped by hand.
pub struct ConnectionHarness {
	pub connection: Connection,
	pub completions: CompletionReceiver,
	pub events: EventReceiver,
	pub provider: Arc<ScriptedProvider>,
	pub transport: Arc<RecordingTransport>,
}
impl ConnectionHarness {
	pub fn new(config: ClientConfig, provider: ScriptedProvider, transport: RecordingTransport) -> Self {
		let (completions_tx, completions) = completion_channel();
		let (events_tx, events) = event_channel(config.event_capacity);
		let provider = Arc::new(provider);
		let transport = Arc::new(transport);
		let connection = Connection::new(
			&config,
			provider.clone(),
			transport.clone(),
			completions_tx,
			events_tx,
		);

		Self { connection, completions, events, provider, transport }
	}

	pub async fn next_envelope(&mut self) -> Envelope {
		next_envelope(&mut self.completions).await
	}

	/// Applies the next completion.
	pub async fn pump(&mut self) {
		let envelope = self.next_envelope().await;

		self.connection.handle(envelope.completion);
	}

	pub fn events(&mut self) -> Vec<ClientEvent> {
		drain(&mut self.events)
	}
}

/// Subscription wired to a scripted provider and recording transport, pumped by hand.
pub struct SubscriptionHarness {
	pub subscription: Subscription,
	pub completions: CompletionReceiver,
	pub events: EventReceiver,
	pub provider: Arc<ScriptedProvider>,
	pub transport: Arc<RecordingTransport>,
}
impl SubscriptionHarness {
	pub fn new(
		name: &str,
		config: ClientConfig,
		provider: ScriptedProvider,
		transport: RecordingTransport,
	) -> Self {
		let (completions_tx, completions) = completion_channel();
		let (events_tx, events) = event_channel(config.event_capacity);
		let provider = Arc::new(provider);
		let transport = Arc::new(transport);
		let subscription = Subscription::new(
			channel(name),
			&config,
			provider.clone(),
			transport.clone(),
			completions_tx,
			events_tx,
		);

		Self { subscription, completions, events, provider, transport }
	}

	pub async fn next_envelope(&mut self) -> Envelope {
		next_envelope(&mut self.completions).await
	}

	/// Applies the next completion.
	pub async fn pump(&mut self) {
		let envelope = self.next_envelope().await;

		self.subscription.handle(envelope.completion);
	}

	pub fn events(&mut self) -> Vec<ClientEvent> {
		drain(&mut self.events)
	}
}
