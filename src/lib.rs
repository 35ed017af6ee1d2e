//! Generation-guarded token refresh for persistent real-time publish/subscribe clients.
//!
//! The crate owns the slice of a pub/sub client that keeps authentication alive: refreshing the
//! connection token and every subscription's channel token. Each refresh attempt is tagged with a
//! [`refresh::Generation`]; only the completion matching the owner's current generation is ever
//! applied, so stale provider results, late transport replies, and timers that outlived a
//! reconnect or unsubscribe are dropped by construction.
//!
//! Refresh results are folded into a closed [`refresh::RefreshOutcome`] so the
//! [`connection::Connection`] and [`subscription::Subscription`] state machines handle provider
//! failures (retry with backoff), server rejections (reconnect or unsubscribe), and transport
//! failures exhaustively. [`client::Client`] runs both state machines on a single task and exposes
//! the result as a stream of [`event::ClientEvent`]s.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod obs;
pub mod provider;
pub mod refresh;
pub mod subscription;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use tokio::sync::{mpsc, oneshot};

	pub use crate::error::{BoxError, Error, Result};
}

#[cfg(test)] use {color_eyre as _, serde_json as _};
