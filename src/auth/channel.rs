//! Strongly typed channel names.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const CHANNEL_MAX_LEN: usize = 255;

/// Error returned when channel name validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ChannelNameError {
	/// The channel name was empty.
	#[error("Channel name cannot be empty.")]
	Empty,
	/// The channel name contains whitespace characters.
	#[error("Channel name contains whitespace.")]
	ContainsWhitespace,
	/// The channel name exceeded the allowed byte count.
	#[error("Channel name exceeds {max} bytes.")]
	TooLong {
		/// Maximum permitted byte count.
		max: usize,
	},
}

/// Name of a pub/sub channel a subscription is bound to.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);
impl ChannelName {
	/// Creates a new channel name after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ChannelNameError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Returns the channel name as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for ChannelName {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ChannelName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ChannelName {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ChannelName> for String {
	fn from(value: ChannelName) -> Self {
		value.0
	}
}
impl TryFrom<String> for ChannelName {
	type Error = ChannelNameError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for ChannelName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Channel({})", self.0)
	}
}
impl Display for ChannelName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for ChannelName {
	type Err = ChannelNameError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), ChannelNameError> {
	if view.is_empty() {
		return Err(ChannelNameError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(ChannelNameError::ContainsWhitespace);
	}
	if view.len() > CHANNEL_MAX_LEN {
		return Err(ChannelNameError::TooLong { max: CHANNEL_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn channel_names_validate() {
		assert_eq!(ChannelName::new(""), Err(ChannelNameError::Empty));
		assert_eq!(ChannelName::new("chat room"), Err(ChannelNameError::ContainsWhitespace));
		assert!(ChannelName::new(format!("news{}", '\u{00A0}')).is_err());

		let channel = ChannelName::new("chat:index").expect("Namespaced channel should be valid.");

		assert_eq!(channel.as_ref(), "chat:index");
		assert_eq!(format!("{channel:?}"), "Channel(chat:index)");
	}

	#[test]
	fn length_limit_is_inclusive() {
		ChannelName::new("a".repeat(CHANNEL_MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			ChannelName::new("a".repeat(CHANNEL_MAX_LEN + 1)),
			Err(ChannelNameError::TooLong { max: CHANNEL_MAX_LEN })
		);
	}

	#[test]
	fn serde_enforces_validation() {
		let channel: ChannelName =
			serde_json::from_str("\"$private\"").expect("Channel should deserialize.");

		assert_eq!(&*channel, "$private");
		assert!(serde_json::from_str::<ChannelName>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ChannelName, u8> = HashMap::from_iter([(
			ChannelName::new("news").expect("Channel used for lookup should be valid."),
			3_u8,
		)]);

		assert_eq!(map.get("news"), Some(&3));
	}
}
