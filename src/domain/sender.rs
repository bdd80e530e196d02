//! Author tag of a chat message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who wrote a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// The person using the chat desk.
    User,
    /// The language-model responder.
    Bot,
}

impl Sender {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Bot => "Bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "User" => Ok(Self::User),
            "Bot" => Ok(Self::Bot),
            _ => Err(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_strings() {
        assert_eq!(Sender::User.as_str(), "User");
        assert_eq!("Bot".parse::<Sender>(), Ok(Sender::Bot));
        assert_eq!("assistant".parse::<Sender>(), Err("assistant".to_string()));
    }
}
