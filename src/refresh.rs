//! Generation-guarded refresh attempts.
//!
//! A [`Refresher`] belongs to exactly one owner (the connection or one subscription) and tracks
//! the owner's current [`Generation`]. Every provider call, token submission, and timer it spawns
//! is tagged with the generation that was current when it started and reports back through the
//! owner's completion queue as an [`Envelope`]. Tasks never touch owner state; the owner compares
//! the delivered generation with [`Refresher::generation`] and drops anything that does not match.
//! Starting a new attempt or cancelling bumps the generation and aborts the previous task without
//! waiting for it.

mod backoff;
mod metrics;
mod outcome;
mod scoped;

pub use backoff::Backoff;
pub use metrics::RefreshMetrics;
pub use outcome::*;
pub use scoped::*;

// crates.io
use tokio::task::AbortHandle;
// self
use crate::{
	_prelude::*,
	auth::{ChannelName, Token},
	obs::{self, RefreshScope, RefreshSpan, RefreshStage},
	transport::SubmitError,
};

/// Monotonic counter identifying the currently relevant refresh attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);
impl Generation {
	/// Returns the raw counter value.
	pub const fn get(self) -> u64 {
		self.0
	}

	/// Returns the generation that follows `self`.
	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}
}
impl Display for Generation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "g{}", self.0)
	}
}

/// Owner a completion is addressed to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
	/// The client's connection.
	Connection,
	/// The subscription bound to a channel.
	Subscription(ChannelName),
}
impl Owner {
	/// Returns the refresh scope of this owner.
	pub fn scope(&self) -> RefreshScope {
		match self {
			Self::Connection => RefreshScope::Connection,
			Self::Subscription(_) => RefreshScope::Subscription,
		}
	}

	/// Returns a label suitable for log fields.
	pub fn label(&self) -> &str {
		match self {
			Self::Connection => "connection",
			Self::Subscription(channel) => channel,
		}
	}
}
impl Display for Owner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Connection => f.write_str("connection"),
			Self::Subscription(channel) => write!(f, "subscription `{channel}`"),
		}
	}
}

/// Progress of a refresh attempt, as seen by the owner.
#[derive(Debug)]
pub enum Step {
	/// The provider call resolved ([`RefreshOutcome::Success`] or
	/// [`RefreshOutcome::ProviderFailure`]).
	Fetched(RefreshOutcome),
	/// The transport finished submitting the refreshed token.
	Submitted(Result<(), SubmitError>),
	/// A backoff delay elapsed; the failed refresh should be retried.
	RetryDue,
	/// The current token is about to expire; a proactive refresh should start.
	RefreshDue,
}

/// One step tagged with the generation that produced it.
#[derive(Debug)]
pub struct Completion {
	/// Generation that was current when the step was scheduled.
	pub generation: Generation,
	/// What happened.
	pub step: Step,
}
impl Completion {
	/// Creates a completion for `generation`.
	pub fn new(generation: Generation, step: Step) -> Self {
		Self { generation, step }
	}
}

/// A completion routed to its owner.
#[derive(Debug)]
pub struct Envelope {
	/// Addressee of the completion.
	pub owner: Owner,
	/// The completion itself.
	pub completion: Completion,
}

/// Sending half of an owner's completion queue.
pub type CompletionSender = mpsc::UnboundedSender<Envelope>;
/// Receiving half of an owner's completion queue.
pub type CompletionReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Creates a completion queue shared by a connection and its subscriptions.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
	mpsc::unbounded_channel()
}

/// Single-flight refresh tracker for one owner.
///
/// Spawning requires a Tokio runtime context.
#[derive(Debug)]
pub struct Refresher {
	owner: Owner,
	generation: Generation,
	in_flight: Option<AbortHandle>,
	timer: Option<AbortHandle>,
	completions: CompletionSender,
	provider_timeout: Option<Duration>,
	metrics: Arc<RefreshMetrics>,
}
impl Refresher {
	/// Creates an idle refresher reporting to `completions`.
	pub fn new(
		owner: Owner,
		completions: CompletionSender,
		provider_timeout: Option<Duration>,
	) -> Self {
		Self {
			owner,
			generation: Generation::default(),
			in_flight: None,
			timer: None,
			completions,
			provider_timeout,
			metrics: Default::default(),
		}
	}

	/// Owner this refresher reports to.
	pub fn owner(&self) -> &Owner {
		&self.owner
	}

	/// Current generation.
	pub fn generation(&self) -> Generation {
		self.generation
	}

	/// Returns `true` when `generation` is the current one.
	pub fn is_current(&self, generation: Generation) -> bool {
		self.generation == generation
	}

	/// Returns `true` while a provider call or submission has not been settled by the owner.
	pub fn is_in_flight(&self) -> bool {
		self.in_flight.is_some()
	}

	/// Returns `true` when neither a task nor a timer can deliver anything under the current
	/// generation.
	pub fn is_idle(&self) -> bool {
		self.in_flight.is_none() && self.timer.is_none()
	}

	/// Counters for this owner's refreshes.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Supersedes every pending task: bumps the generation and aborts in-flight work without
	/// waiting for it. Anything already queued for the owner becomes stale.
	pub fn cancel(&mut self) -> Generation {
		self.abort_all();
		self.generation = self.generation.next();

		self.generation
	}

	/// Starts a new attempt that resolves `fetch` and returns its generation.
	pub(crate) fn begin<F>(&mut self, fetch: F) -> Generation
	where
		F: 'static + Send + Future<Output = Result<Token, BoxError>>,
	{
		let generation = self.cancel();
		let scope = self.owner.scope();
		let span = RefreshSpan::new(scope, self.owner.label(), generation);
		let timeout = self.provider_timeout;
		let owner = self.owner.clone();
		let completions = self.completions.clone();

		self.metrics.record_attempt();
		obs::record_refresh(scope, self.owner.label(), RefreshStage::Attempt, generation);

		let handle = tokio::spawn(span.instrument(async move {
			let result = match timeout {
				Some(limit) => match tokio::time::timeout(limit, fetch).await {
					Ok(result) => result,
					Err(elapsed) => Err(Box::new(elapsed) as BoxError),
				},
				None => fetch.await,
			};

			deliver(&completions, owner, generation, Step::Fetched(result.into()));
		}));

		self.in_flight = Some(handle.abort_handle());

		generation
	}

	/// Submits the refreshed token under the current generation.
	pub(crate) fn submit<F>(&mut self, submit: F)
	where
		F: 'static + Send + Future<Output = Result<(), SubmitError>>,
	{
		let generation = self.generation;
		let owner = self.owner.clone();
		let completions = self.completions.clone();
		let handle = tokio::spawn(async move {
			let result = submit.await;

			deliver(&completions, owner, generation, Step::Submitted(result));
		});

		if let Some(previous) = self.in_flight.replace(handle.abort_handle()) {
			previous.abort();
		}
	}

	/// Delivers `step` after `delay`, tagged with the current generation.
	pub(crate) fn schedule(&mut self, delay: Duration, step: Step) {
		let generation = self.generation;
		let owner = self.owner.clone();
		let completions = self.completions.clone();
		let handle = tokio::spawn(async move {
			tokio::time::sleep(delay).await;

			deliver(&completions, owner, generation, step);
		});

		if let Some(previous) = self.timer.replace(handle.abort_handle()) {
			previous.abort();
		}
	}

	/// Marks the in-flight task as consumed by the owner.
	pub(crate) fn settle(&mut self) {
		self.in_flight = None;
	}

	/// Marks the pending timer as consumed by the owner.
	pub(crate) fn settle_timer(&mut self) {
		self.timer = None;
	}

	fn abort_all(&mut self) {
		if let Some(handle) = self.in_flight.take() {
			handle.abort();
		}
		if let Some(handle) = self.timer.take() {
			handle.abort();
		}
	}
}
impl Drop for Refresher {
	fn drop(&mut self) {
		self.abort_all();
	}
}

fn deliver(completions: &CompletionSender, owner: Owner, generation: Generation, step: Step) {
	// The owner is gone when the queue is closed; nothing is left to update.
	let _ = completions.send(Envelope { owner, completion: Completion::new(generation, step) });
}
