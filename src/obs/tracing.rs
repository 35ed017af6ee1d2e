// self
use crate::{
	_prelude::*,
	obs::{RefreshScope, RefreshStage},
	refresh::Generation,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRefresh<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRefresh<F> = F;

/// A span wrapping one refresh attempt.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the scope, owner, and attempt generation.
	pub fn new(scope: RefreshScope, owner: &str, generation: Generation) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"realtime_refresh.refresh",
				scope = scope.as_str(),
				owner,
				generation = generation.get()
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (scope, owner, generation);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRefresh<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn log_refresh(
	scope: RefreshScope,
	owner: &str,
	stage: RefreshStage,
	generation: Generation,
	cause: Option<&(dyn StdError + 'static)>,
) {
	#[cfg(feature = "tracing")]
	{
		let scope = scope.as_str();
		let generation = generation.get();

		match (stage, cause) {
			(RefreshStage::Stale, _) => tracing::debug!(
				scope,
				owner,
				generation,
				"discarded refresh completion from a superseded generation"
			),
			(RefreshStage::Attempt | RefreshStage::Retry, _) =>
				tracing::debug!(scope, owner, generation, stage = stage.as_str(), "refresh"),
			(RefreshStage::Success, _) =>
				tracing::info!(scope, owner, generation, "refreshed token acknowledged"),
			(_, Some(cause)) => tracing::warn!(
				scope,
				owner,
				generation,
				stage = stage.as_str(),
				error = %cause,
				"refresh failed"
			),
			(_, None) => tracing::warn!(
				scope,
				owner,
				generation,
				stage = stage.as_str(),
				"refresh failed"
			),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (scope, owner, stage, generation, cause);
	}
}
