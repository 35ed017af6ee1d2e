//! Client driver running the connection and subscription state machines on one task.
//!
//! [`Client::spawn`] moves a [`Connection`] and its [`Subscription`]s into a background task that
//! processes one command or refresh completion at a time. The returned [`Client`] handle is
//! cheap to clone and only sends commands; state changes, retry notices, and terminal refresh
//! errors are observed through [`ClientEvents`].

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::ChannelName,
	config::ClientConfig,
	connection::{Connection, ConnectionState},
	event::{self, ClientEvent, EventReceiver, EventSender},
	obs::{self, RefreshScope, RefreshStage},
	provider::{ConnectionTokenProvider, SubscriptionTokenProvider},
	refresh::{
		CompletionReceiver, CompletionSender, Envelope, Generation, Owner, RefreshMetrics,
		completion_channel,
	},
	subscription::{Subscription, SubscriptionState},
	transport::Transport,
};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Cloneable handle to a running client.
#[derive(Clone, Debug)]
pub struct Client {
	commands: mpsc::UnboundedSender<Command>,
	snapshot: Arc<RwLock<Snapshot>>,
	metrics: Arc<RefreshMetrics>,
}
impl Client {
	/// Validates `config` and starts the client task on the current Tokio runtime.
	pub fn spawn(
		config: ClientConfig,
		provider: Arc<dyn ConnectionTokenProvider>,
		transport: Arc<dyn Transport>,
	) -> Result<(Self, ClientEvents)> {
		config.validate()?;

		let (commands_tx, commands_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = event::event_channel(config.event_capacity);
		let (completions_tx, completions_rx) = completion_channel();
		let connection = Connection::new(
			&config,
			provider,
			transport.clone(),
			completions_tx.clone(),
			events_tx.clone(),
		);
		let snapshot = Arc::new(RwLock::new(Snapshot::new(connection.state())));
		let metrics = connection.metrics().clone();
		let events = ClientEvents { rx: events_rx, dropped: events_tx.dropped_counter() };
		let runtime = Runtime {
			config,
			connection,
			subscriptions: HashMap::new(),
			transport,
			completions: completions_tx,
			events: events_tx,
			snapshot: snapshot.clone(),
		};

		tokio::spawn(runtime.run(commands_rx, completions_rx));

		Ok((Self { commands: commands_tx, snapshot, metrics }, events))
	}

	/// Last published connection state.
	pub fn connection_state(&self) -> ConnectionState {
		self.snapshot.read().connection
	}

	/// Last published state of the subscription to `channel`, if one is live.
	pub fn subscription_state(&self, channel: &ChannelName) -> Option<SubscriptionState> {
		self.snapshot.read().subscriptions.get(channel).copied()
	}

	/// Refresh counters for the connection.
	pub fn connection_metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Reports that the transport established a session.
	pub async fn on_connected(&self, expires_at: Option<OffsetDateTime>) -> Result<()> {
		self.request(|reply| Command::Connected { expires_at, reply }).await
	}

	/// Reports that the transport lost the session.
	pub async fn on_disconnected(&self) -> Result<()> {
		self.request(|reply| Command::Disconnected { reply }).await
	}

	/// Requests a connection token refresh.
	pub async fn refresh_connection(&self) -> Result<Option<Generation>> {
		self.request(|reply| Command::RefreshConnection { reply }).await
	}

	/// Registers a subscription to `channel` whose tokens come from `provider`.
	pub async fn subscribe(
		&self,
		channel: ChannelName,
		provider: Arc<dyn SubscriptionTokenProvider>,
	) -> Result<()> {
		self.request(|reply| Command::Subscribe { channel, provider, reply }).await
	}

	/// Reports that the server confirmed the subscription to `channel`.
	pub async fn on_subscribed(
		&self,
		channel: ChannelName,
		expires_at: Option<OffsetDateTime>,
	) -> Result<()> {
		self.request(|reply| Command::Subscribed { channel, expires_at, reply }).await
	}

	/// Requests a channel token refresh for `channel`.
	pub async fn refresh_subscription(&self, channel: ChannelName) -> Result<Option<Generation>> {
		self.request(|reply| Command::RefreshSubscription { channel, reply }).await
	}

	/// Tears down the subscription to `channel`.
	pub async fn unsubscribe(&self, channel: ChannelName) -> Result<()> {
		self.request(|reply| Command::Unsubscribe { channel, reply }).await
	}

	/// Closes the connection and every subscription.
	pub async fn close(&self) -> Result<()> {
		self.request(|reply| Command::Close { reply }).await
	}

	async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
		let (reply, rx) = oneshot::channel();

		self.commands.send(command(reply)).map_err(|_| Error::Shutdown)?;

		rx.await.map_err(|_| Error::Shutdown)?
	}
}

/// Stream of [`ClientEvent`]s produced by a running client.
#[derive(Debug)]
pub struct ClientEvents {
	rx: EventReceiver,
	dropped: Arc<AtomicU64>,
}
impl ClientEvents {
	/// Number of state changes and retry notices dropped because this stream fell behind.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	/// Waits for the next event; `None` once the client task has stopped.
	pub async fn next(&mut self) -> Option<ClientEvent> {
		self.rx.recv().await
	}

	/// Returns an already queued event without waiting.
	pub fn try_next(&mut self) -> Option<ClientEvent> {
		self.rx.try_recv().ok()
	}
}

#[derive(Debug)]
struct Snapshot {
	connection: ConnectionState,
	subscriptions: HashMap<ChannelName, SubscriptionState>,
}
impl Snapshot {
	fn new(connection: ConnectionState) -> Self {
		Self { connection, subscriptions: HashMap::new() }
	}
}

enum Command {
	Connected { expires_at: Option<OffsetDateTime>, reply: Reply<()> },
	Disconnected { reply: Reply<()> },
	RefreshConnection { reply: Reply<Option<Generation>> },
	Subscribe { channel: ChannelName, provider: Arc<dyn SubscriptionTokenProvider>, reply: Reply<()> },
	Subscribed { channel: ChannelName, expires_at: Option<OffsetDateTime>, reply: Reply<()> },
	RefreshSubscription { channel: ChannelName, reply: Reply<Option<Generation>> },
	Unsubscribe { channel: ChannelName, reply: Reply<()> },
	Close { reply: Reply<()> },
}
impl Debug for Command {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let name = match self {
			Command::Connected { .. } => "Connected",
			Command::Disconnected { .. } => "Disconnected",
			Command::RefreshConnection { .. } => "RefreshConnection",
			Command::Subscribe { .. } => "Subscribe",
			Command::Subscribed { .. } => "Subscribed",
			Command::RefreshSubscription { .. } => "RefreshSubscription",
			Command::Unsubscribe { .. } => "Unsubscribe",
			Command::Close { .. } => "Close",
		};

		f.write_str(name)
	}
}

struct Runtime {
	config: ClientConfig,
	connection: Connection,
	subscriptions: HashMap<ChannelName, Subscription>,
	transport: Arc<dyn Transport>,
	completions: CompletionSender,
	events: EventSender,
	snapshot: Arc<RwLock<Snapshot>>,
}
impl Runtime {
	async fn run(
		mut self,
		mut commands: mpsc::UnboundedReceiver<Command>,
		mut completions: CompletionReceiver,
	) {
		loop {
			tokio::select! {
				command = commands.recv() => match command {
					Some(command) => self.execute(command),
					// Every handle is gone.
					None => break,
				},
				Some(envelope) = completions.recv() => {
					self.dispatch(envelope);
					self.publish();
				},
			}
		}

		self.close();
	}

	fn execute(&mut self, command: Command) {
		match command {
			Command::Connected { expires_at, reply } => {
				let result = self.connection.on_connected(expires_at);

				self.respond(reply, result);
			},
			Command::Disconnected { reply } => {
				self.connection.on_disconnected();
				self.respond(reply, Ok(()));
			},
			Command::RefreshConnection { reply } => {
				let result = self.connection.on_refresh_required();

				self.respond(reply, result);
			},
			Command::Subscribe { channel, provider, reply } => {
				let result = self.subscribe(channel, provider);

				self.respond(reply, result);
			},
			Command::Subscribed { channel, expires_at, reply } => {
				let result =
					self.subscription(&channel).and_then(|sub| sub.on_subscribed(expires_at));

				self.respond(reply, result);
			},
			Command::RefreshSubscription { channel, reply } => {
				let result = self.subscription(&channel).and_then(Subscription::on_refresh_required);

				self.respond(reply, result);
			},
			Command::Unsubscribe { channel, reply } => {
				let result = self.subscription(&channel).map(Subscription::unsubscribe);

				self.prune();
				self.respond(reply, result);
			},
			Command::Close { reply } => {
				self.close();
				self.respond(reply, Ok(()));
			},
		}
	}

	fn subscribe(
		&mut self,
		channel: ChannelName,
		provider: Arc<dyn SubscriptionTokenProvider>,
	) -> Result<()> {
		if self.connection.state().is_terminal() {
			return Err(Error::Closed);
		}
		if self.subscriptions.contains_key(&channel) {
			return Err(Error::AlreadySubscribed { channel });
		}

		let subscription = Subscription::new(
			channel.clone(),
			&self.config,
			provider,
			self.transport.clone(),
			self.completions.clone(),
			self.events.clone(),
		);

		self.subscriptions.insert(channel, subscription);

		Ok(())
	}

	fn subscription(&mut self, channel: &ChannelName) -> Result<&mut Subscription> {
		self.subscriptions
			.get_mut(channel)
			.ok_or_else(|| Error::NotSubscribed { channel: channel.clone() })
	}

	fn dispatch(&mut self, envelope: Envelope) {
		let Envelope { owner, completion } = envelope;

		match owner {
			Owner::Connection => self.connection.handle(completion),
			Owner::Subscription(channel) => match self.subscriptions.get_mut(&channel) {
				Some(subscription) => {
					subscription.handle(completion);

					self.prune();
				},
				None => obs::record_refresh(
					RefreshScope::Subscription,
					&channel,
					RefreshStage::Stale,
					completion.generation,
				),
			},
		}
	}

	fn close(&mut self) {
		for subscription in self.subscriptions.values_mut() {
			subscription.unsubscribe();
		}

		self.prune();
		self.connection.close();
		self.publish();
	}

	fn prune(&mut self) {
		self.subscriptions.retain(|_, subscription| !subscription.state().is_terminal());
	}

	fn publish(&self) {
		let mut snapshot = self.snapshot.write();

		snapshot.connection = self.connection.state();
		snapshot.subscriptions = self
			.subscriptions
			.iter()
			.map(|(channel, subscription)| (channel.clone(), subscription.state()))
			.collect();
	}

	fn respond<T>(&self, reply: Reply<T>, result: Result<T>) {
		self.publish();

		let _ = reply.send(result);
	}
}
