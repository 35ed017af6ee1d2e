//! Subscription lifecycle driven by channel token refresh outcomes.

// self
use crate::{
	_prelude::*,
	auth::{ChannelName, Token, token},
	config::ClientConfig,
	error::SubscriptionRefreshError,
	event::{self, ClientEvent, EventSender},
	obs::{self, RefreshStage},
	provider::SubscriptionTokenProvider,
	refresh::{
		Backoff, Completion, CompletionSender, Generation, RefreshMetrics, RefreshOutcome, Step,
		SubscriptionTokenRefresher,
	},
	transport::Transport,
};

/// Lifecycle states of a channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
	/// Subscribe request sent; waiting for the server to confirm.
	Subscribing,
	/// Subscription confirmed; the channel token is accepted.
	Subscribed,
	/// A channel token refresh is in flight or waiting for its retry.
	Refreshing,
	/// Unsubscribed by the application or after a rejected token; terminal.
	Unsubscribed,
}
impl SubscriptionState {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			SubscriptionState::Subscribing => "subscribing",
			SubscriptionState::Subscribed => "subscribed",
			SubscriptionState::Refreshing => "refreshing",
			SubscriptionState::Unsubscribed => "unsubscribed",
		}
	}

	/// Returns `true` once no further transition is possible.
	pub const fn is_terminal(self) -> bool {
		matches!(self, SubscriptionState::Unsubscribed)
	}
}
impl Display for SubscriptionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Subscription state machine consuming [`SubscriptionTokenRefresher`] outcomes for one channel.
///
/// Transient failures (provider or transport) never unsubscribe the channel; they are retried
/// with backoff. A server rejection is terminal for the channel and is surfaced exactly once.
pub struct Subscription {
	state: SubscriptionState,
	refresher: SubscriptionTokenRefresher,
	provider: Arc<dyn SubscriptionTokenProvider>,
	transport: Arc<dyn Transport>,
	backoff: Backoff,
	refresh_margin: Duration,
	pending_expiry: Option<OffsetDateTime>,
	events: EventSender,
}
impl Subscription {
	/// Creates a subscription to `channel` in [`SubscriptionState::Subscribing`].
	pub fn new(
		channel: ChannelName,
		config: &ClientConfig,
		provider: Arc<dyn SubscriptionTokenProvider>,
		transport: Arc<dyn Transport>,
		completions: CompletionSender,
		events: EventSender,
	) -> Self {
		Self {
			state: SubscriptionState::Subscribing,
			refresher: SubscriptionTokenRefresher::new(
				channel,
				completions,
				config.provider_timeout,
			),
			provider,
			transport,
			backoff: Backoff::new(config.backoff),
			refresh_margin: config.refresh_margin,
			pending_expiry: None,
			events,
		}
	}

	/// Channel this subscription is bound to.
	pub fn channel(&self) -> &ChannelName {
		self.refresher.channel()
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SubscriptionState {
		self.state
	}

	/// Generation of the current refresh attempt.
	pub fn generation(&self) -> Generation {
		self.refresher.generation()
	}

	/// Refresh counters for this subscription.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	/// Reports that the server confirmed the subscription; the channel token expires at
	/// `expires_at`.
	pub fn on_subscribed(&mut self, expires_at: Option<OffsetDateTime>) -> Result<()> {
		if self.state.is_terminal() {
			return Err(self.not_subscribed());
		}

		self.refresher.cancel();
		self.backoff.reset();
		self.pending_expiry = None;
		self.transition(SubscriptionState::Subscribed);
		self.schedule_refresh(expires_at);

		Ok(())
	}

	/// Requests a channel token refresh.
	///
	/// Returns the generation now responsible for the refresh, reusing the in-flight attempt or
	/// the pending retry if present, or `None` while the subscription is still being confirmed.
	pub fn on_refresh_required(&mut self) -> Result<Option<Generation>> {
		match self.state {
			SubscriptionState::Unsubscribed => Err(self.not_subscribed()),
			SubscriptionState::Refreshing if !self.refresher.is_idle() =>
				Ok(Some(self.refresher.generation())),
			SubscriptionState::Subscribed | SubscriptionState::Refreshing => Ok(Some(self.start())),
			SubscriptionState::Subscribing => Ok(None),
		}
	}

	/// Tears the subscription down; every pending refresh result becomes stale.
	pub fn unsubscribe(&mut self) {
		if self.state.is_terminal() {
			return;
		}

		self.refresher.cancel();
		self.transition(SubscriptionState::Unsubscribed);
	}

	/// Applies a completion delivered by this subscription's refresher.
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

				if self.state == SubscriptionState::Refreshing {
					self.start();
				}
			},
			Step::RefreshDue => {
				self.refresher.settle_timer();

				if self.state == SubscriptionState::Subscribed {
					self.start();
				}
			},
		}
	}

	fn start(&mut self) -> Generation {
		self.transition(SubscriptionState::Refreshing);

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
			RefreshOutcome::TransportFailure(cause) => {
				self.refresher.metrics().record_transport_failure();
				self.record(RefreshStage::TransportFailure, generation, Some(&*cause));
				self.retry();
			},
			RefreshOutcome::ServerRejected(cause) => {
				let channel = self.channel().clone();

				self.refresher.metrics().record_rejection();
				self.record(RefreshStage::ServerRejected, generation, Some(&*cause));
				self.unsubscribe();
				event::emit(
					&self.events,
					ClientEvent::Error(SubscriptionRefreshError::new(channel, cause).into()),
				);
			},
		}
	}

	fn submit(&mut self, token: Token) {
		let transport = self.transport.clone();
		let channel = self.channel().clone();

		self.pending_expiry = token.expires_at();
		self.refresher
			.submit(async move { transport.submit_subscription_token(channel, token).await });
	}

	fn acknowledged(&mut self) {
		let expires_at = self.pending_expiry.take();

		self.refresher.settle();
		self.backoff.reset();
		self.refresher.metrics().record_success();
		self.record(RefreshStage::Success, self.refresher.generation(), None);
		self.transition(SubscriptionState::Subscribed);
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
				owner: self.refresher.owner().clone(),
				attempt: self.backoff.failures(),
				delay,
			},
		);
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

	fn not_subscribed(&self) -> Error {
		Error::NotSubscribed { channel: self.channel().clone() }
	}

	fn transition(&mut self, to: SubscriptionState) {
		if self.state == to {
			return;
		}

		let from = std::mem::replace(&mut self.state, to);

		event::emit(
			&self.events,
			ClientEvent::SubscriptionState { channel: self.channel().clone(), from, to },
		);
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription")
			.field("state", &self.state)
			.field("refresher", &self.refresher)
			.field("backoff", &self.backoff)
			.field("refresh_margin", &self.refresh_margin)
			.finish_non_exhaustive()
	}
}
