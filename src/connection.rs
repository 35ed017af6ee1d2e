//! Connection lifecycle driven by connection token refresh outcomes.

// self
use crate::{
	_prelude::*,
	auth::{Token, token},
	config::ClientConfig,
	error::TokenError,
	event::{self, ClientEvent, EventSender},
	obs::{self, RefreshStage},
	provider::ConnectionTokenProvider,
	refresh::{
		Backoff, Completion, CompletionSender, ConnectionTokenRefresher, Generation, Owner,
		RefreshMetrics, RefreshOutcome, Step,
	},
	transport::Transport,
};

/// Lifecycle states of a connection, restricted to those refresh outcomes can reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	/// Waiting for the transport to establish the first session.
	Connecting,
	/// Session established; the current token is accepted.
	Connected,
	/// A connection token refresh is in flight or waiting for its retry.
	Refreshing,
	/// The session was lost or invalidated; the transport is reconnecting.
	Reconnecting,
	/// Explicitly closed; terminal.
	Closed,
}
impl ConnectionState {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::Refreshing => "refreshing",
			ConnectionState::Reconnecting => "reconnecting",
			ConnectionState::Closed => "closed",
		}
	}

	/// Returns `true` once no further transition is possible.
	pub const fn is_terminal(self) -> bool {
		matches!(self, ConnectionState::Closed)
	}
}
impl Display for ConnectionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Connection state machine consuming [`ConnectionTokenRefresher`] outcomes.
///
/// All methods take `&mut self` and must be driven from one task; spawned provider calls,
/// submissions, and timers report back through the completion queue handed to [`Connection::new`]
/// and are applied with [`Connection::handle`].
pub struct Connection {
	state: ConnectionState,
	refresher: ConnectionTokenRefresher,
	provider: Arc<dyn ConnectionTokenProvider>,
	transport: Arc<dyn Transport>,
	backoff: Backoff,
	refresh_margin: Duration,
	pending_expiry: Option<OffsetDateTime>,
	events: EventSender,
}
impl Connection {
	/// Creates a connection in [`ConnectionState::Connecting`].
	pub fn new(
		config: &ClientConfig,
		provider: Arc<dyn ConnectionTokenProvider>,
		transport: Arc<dyn Transport>,
		completions: CompletionSender,
		events: EventSender,
	) -> Self {
		Self {
			state: ConnectionState::Connecting,
			refresher: ConnectionTokenRefresher::new(completions, config.provider_timeout),
			provider,
			transport,
			backoff: Backoff::new(config.backoff),
			refresh_margin: config.refresh_margin,
			pending_expiry: None,
			events,
		}
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ConnectionState {
		self.state
	}

	/// Generation of the current refresh attempt.
	pub fn generation(&self) -> Generation {
		self.refresher.generation()
	}

	/// Refresh counters for this connection.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	/// Reports that the transport established a session whose token expires at `expires_at`.
	///
	/// Anything still pending from the previous session becomes stale. With an expiry hint, a
	/// proactive refresh is scheduled `refresh_margin` ahead of it.
	pub fn on_connected(&mut self, expires_at: Option<OffsetDateTime>) -> Result<()> {
		if self.state.is_terminal() {
			return Err(Error::Closed);
		}

		self.refresher.cancel();
		self.backoff.reset();
		self.pending_expiry = None;
		self.transition(ConnectionState::Connected);
		self.schedule_refresh(expires_at);

		Ok(())
	}

	/// Reports that the transport lost the session.
	pub fn on_disconnected(&mut self) {
		if !matches!(self.state, ConnectionState::Connected | ConnectionState::Refreshing) {
			return;
		}

		self.refresher.cancel();
		self.transition(ConnectionState::Reconnecting);
	}

	/// Requests a connection token refresh (server expiry signal or auth failure).
	///
	/// Returns the generation of the attempt now responsible for the refresh, reusing the
	/// in-flight one or the pending retry if present, or `None` when the connection has no
	/// session to refresh.
	pub fn on_refresh_required(&mut self) -> Result<Option<Generation>> {
		match self.state {
			ConnectionState::Closed => Err(Error::Closed),
			ConnectionState::Refreshing if !self.refresher.is_idle() =>
				Ok(Some(self.refresher.generation())),
			ConnectionState::Connected | ConnectionState::Refreshing => Ok(Some(self.start())),
			ConnectionState::Connecting | ConnectionState::Reconnecting => Ok(None),
		}
	}

	/// Closes the connection; every pending refresh result becomes stale.
	pub fn close(&mut self) {
		if self.state.is_terminal() {
			return;
		}

		self.refresher.cancel();
		self.transition(ConnectionState::Closed);
	}

	/// Applies a completion delivered by this connection's refresher.
	///
	/// Completions from a superseded generation, or arriving after close, leave the state
	/// untouched.
	pub fn handle(&mut self, completion: Completion) {
		let Completion { generation, step } = completion;

		if self.state.is_terminal() || !self.refresher.is_current(generation) {
			self.refresher.metrics().record_stale();
			self.record(RefreshStage::Stale, generation, None);

			return;
		}

		match step {
			Step::Fetched(outcome) => self.apply(outcome),
			Step::Submitted(Ok(())) => self.acknowledged(),
			Step::Submitted(Err(err)) => match RefreshOutcome::from_submit_error(err) {
				Some(outcome) => self.apply(outcome),
				// Closed transport: nothing to submit to. The next request starts over.
				None => {
					self.pending_expiry = None;
					self.refresher.settle();
				},
			},
			Step::RetryDue => {
				self.refresher.settle_timer();

				if self.state == ConnectionState::Refreshing {
					self.start();
				}
			},
			Step::RefreshDue => {
				self.refresher.settle_timer();

				if self.state == ConnectionState::Connected {
					self.start();
				}
			},
		}
	}

	fn start(&mut self) -> Generation {
		self.transition(ConnectionState::Refreshing);

		self.refresher.start(self.provider.clone())
	}

	fn apply(&mut self, outcome: RefreshOutcome) {
		let generation = self.refresher.generation();

		match outcome {
			RefreshOutcome::Success(token) => self.submit(token),
			RefreshOutcome::ProviderFailure(cause) => {
				self.refresher.metrics().record_provider_failure();
				self.record(RefreshStage::ProviderFailure, generation, Some(&*cause));
				self.retry();
			},
			RefreshOutcome::ServerRejected(cause) => {
				self.refresher.metrics().record_rejection();
				self.record(RefreshStage::ServerRejected, generation, Some(&*cause));
				self.reconnect();
				event::emit(&self.events, ClientEvent::Error(TokenError::new(cause).into()));
			},
			RefreshOutcome::TransportFailure(cause) => {
				self.refresher.metrics().record_transport_failure();
				self.record(RefreshStage::TransportFailure, generation, Some(&*cause));
				self.reconnect();
			},
		}
	}

	fn submit(&mut self, token: Token) {
		let transport = self.transport.clone();

		self.pending_expiry = token.expires_at();
		self.refresher.submit(async move { transport.submit_connection_token(token).await });
	}

	fn acknowledged(&mut self) {
		let expires_at = self.pending_expiry.take();

		self.refresher.settle();
		self.backoff.reset();
		self.refresher.metrics().record_success();
		self.record(RefreshStage::Success, self.refresher.generation(), None);
		self.transition(ConnectionState::Connected);
		self.schedule_refresh(expires_at);
	}

	fn retry(&mut self) {
		let delay = self.backoff.next_delay();

		self.pending_expiry = None;
		self.refresher.settle();
		self.refresher.metrics().record_retry();
		obs::record_retry(
			self.refresher.owner().scope(),
			self.refresher.owner().label(),
			self.refresher.generation(),
			delay,
		);
		self.refresher.schedule(delay, Step::RetryDue);
		event::emit(
			&self.events,
			ClientEvent::RefreshRetrying {
				owner: Owner::Connection,
				attempt: self.backoff.failures(),
				delay,
			},
		);
	}

	fn reconnect(&mut self) {
		self.refresher.cancel();
		self.backoff.reset();
		self.pending_expiry = None;
		self.transition(ConnectionState::Reconnecting);
		self.transport.reconnect();
	}

	fn schedule_refresh(&mut self, expires_at: Option<OffsetDateTime>) {
		if let Some(expires_at) = expires_at {
			let delay = token::refresh_delay(expires_at, OffsetDateTime::now_utc(), self.refresh_margin);

			self.refresher.schedule(delay, Step::RefreshDue);
		}
	}

	fn record(
		&self,
		stage: RefreshStage,
		generation: Generation,
		cause: Option<&(dyn StdError + 'static)>,
	) {
		let owner = self.refresher.owner();

		match cause {
			Some(cause) =>
				obs::record_refresh_failure(owner.scope(), owner.label(), stage, generation, cause),
			None => obs::record_refresh(owner.scope(), owner.label(), stage, generation),
		}
	}

	fn transition(&mut self, to: ConnectionState) {
		if self.state == to {
			return;
		}

		let from = std::mem::replace(&mut self.state, to);

		event::emit(&self.events, ClientEvent::ConnectionState { from, to });
	}
}
impl Debug for Connection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Connection")
			.field("state", &self.state)
			.field("refresher", &self.refresher)
			.field("backoff", &self.backoff)
			.field("refresh_margin", &self.refresh_margin)
			.finish_non_exhaustive()
	}
}
