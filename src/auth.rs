//! Channel identifiers and token models.

pub mod channel;
pub mod token;

pub use channel::*;
pub use token::*;
