//! Closed result of a single refresh attempt.

// self
use crate::{_prelude::*, auth::Token, transport::SubmitError};

/// Label for a [`RefreshOutcome`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
	/// The token was obtained (or acknowledged).
	Success,
	/// The provider call failed.
	ProviderFailure,
	/// The server refused the refreshed token.
	ServerRejected,
	/// The transport broke while submitting the token.
	TransportFailure,
}
impl OutcomeKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			OutcomeKind::Success => "success",
			OutcomeKind::ProviderFailure => "provider_failure",
			OutcomeKind::ServerRejected => "server_rejected",
			OutcomeKind::TransportFailure => "transport_failure",
		}
	}
}
impl Display for OutcomeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of one refresh attempt, handled exhaustively by the owning state machine.
#[derive(Debug)]
pub enum RefreshOutcome {
	/// The provider yielded a new token.
	Success(Token),
	/// The provider call itself failed (backend error, logic error, timeout, cancellation).
	ProviderFailure(BoxError),
	/// The token was submitted and the server reported it invalid or expired.
	ServerRejected(BoxError),
	/// The transport broke while the token was being submitted.
	TransportFailure(BoxError),
}
impl RefreshOutcome {
	/// Builds a success outcome from a token string and optional expiry hint.
	pub fn success(token: impl Into<Arc<str>>, expires_at: Option<OffsetDateTime>) -> Self {
		Self::Success(Token::new(token).with_expiry(expires_at))
	}

	/// Builds a provider failure outcome.
	pub fn provider_failure(cause: impl Into<BoxError>) -> Self {
		Self::ProviderFailure(cause.into())
	}

	/// Builds a server rejection outcome.
	pub fn server_rejected(cause: impl Into<BoxError>) -> Self {
		Self::ServerRejected(cause.into())
	}

	/// Builds a transport failure outcome.
	pub fn transport_failure(cause: impl Into<BoxError>) -> Self {
		Self::TransportFailure(cause.into())
	}

	/// Returns the variant label.
	pub fn kind(&self) -> OutcomeKind {
		match self {
			Self::Success(_) => OutcomeKind::Success,
			Self::ProviderFailure(_) => OutcomeKind::ProviderFailure,
			Self::ServerRejected(_) => OutcomeKind::ServerRejected,
			Self::TransportFailure(_) => OutcomeKind::TransportFailure,
		}
	}

	/// Returns `true` for every variant except [`RefreshOutcome::Success`].
	pub fn is_failure(&self) -> bool {
		!matches!(self, Self::Success(_))
	}

	/// Returns the refreshed token on success.
	pub fn token(&self) -> Option<&Token> {
		match self {
			Self::Success(token) => Some(token),
			_ => None,
		}
	}

	/// Returns the failure cause, if any.
	pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
		match self {
			Self::Success(_) => None,
			Self::ProviderFailure(cause)
			| Self::ServerRejected(cause)
			| Self::TransportFailure(cause) => Some(cause.as_ref()),
		}
	}

	/// Consumes the outcome and returns the failure cause, if any.
	pub fn into_cause(self) -> Option<BoxError> {
		match self {
			Self::Success(_) => None,
			Self::ProviderFailure(cause)
			| Self::ServerRejected(cause)
			| Self::TransportFailure(cause) => Some(cause),
		}
	}

	/// Folds a failed submission into an outcome; a closed transport yields `None`.
	pub(crate) fn from_submit_error(err: SubmitError) -> Option<Self> {
		match err {
			SubmitError::Rejected(cause) => Some(Self::ServerRejected(cause)),
			SubmitError::Failed(cause) => Some(Self::TransportFailure(cause)),
			SubmitError::Closed => None,
		}
	}
}
impl From<Result<Token, BoxError>> for RefreshOutcome {
	fn from(result: Result<Token, BoxError>) -> Self {
		match result {
			Ok(token) => Self::Success(token),
			Err(cause) => Self::ProviderFailure(cause),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_carries_token_and_expiry() {
		let expires_at = OffsetDateTime::UNIX_EPOCH + time::Duration::hours(1);
		let outcome = RefreshOutcome::success("T1", Some(expires_at));

		assert!(!outcome.is_failure());
		assert_eq!(outcome.kind(), OutcomeKind::Success);
		assert_eq!(outcome.token().map(Token::expose), Some("T1"));
		assert_eq!(outcome.token().and_then(Token::expires_at), Some(expires_at));
		assert!(outcome.cause().is_none());
		assert!(outcome.into_cause().is_none());
	}

	#[test]
	fn failures_expose_their_cause() {
		for (outcome, kind) in [
			(RefreshOutcome::provider_failure("dns failure"), OutcomeKind::ProviderFailure),
			(RefreshOutcome::server_rejected("dns failure"), OutcomeKind::ServerRejected),
			(RefreshOutcome::transport_failure("dns failure"), OutcomeKind::TransportFailure),
		] {
			assert!(outcome.is_failure());
			assert_eq!(outcome.kind(), kind);
			assert!(outcome.token().is_none());
			assert_eq!(outcome.cause().map(ToString::to_string), Some("dns failure".into()));
		}
	}

	#[test]
	fn submit_errors_fold_into_outcomes() {
		let rejected = RefreshOutcome::from_submit_error(SubmitError::rejected("expired"))
			.expect("Rejections should produce an outcome.");
		let failed = RefreshOutcome::from_submit_error(SubmitError::failed("reset by peer"))
			.expect("Transport failures should produce an outcome.");

		assert_eq!(rejected.kind(), OutcomeKind::ServerRejected);
		assert_eq!(failed.kind(), OutcomeKind::TransportFailure);
		assert!(RefreshOutcome::from_submit_error(SubmitError::Closed).is_none());
	}
}
