//! Inbound control messages and the consumer identity they register.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::NotificationKey;

/// Which foreground surface is entitled to receive relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerIdentity {
    #[default]
    None,
    /// The full notification list screen.
    Detailed,
    /// The home screen badge.
    Summary,
}

impl ConsumerIdentity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Detailed => "detailed",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsumerIdentity {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "detailed" => Ok(Self::Detailed),
            "summary" => Ok(Self::Summary),
            _ => Err(CommandError::UnknownIdentity(s.to_string())),
        }
    }
}

/// A control request from the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Replace the registered consumer. Last writer wins.
    RegisterConsumer { identity: ConsumerIdentity },
    /// Dismiss one notification by key.
    Dismiss { key: NotificationKey },
    /// Dismiss every clearable missed-call notification.
    ClearMissedCalls,
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterConsumer { .. } => "register_consumer",
            Self::Dismiss { .. } => "dismiss",
            Self::ClearMissedCalls => "clear_missed_calls",
        }
    }

    /// Decodes a JSON command.
    ///
    /// Tags outside the known set are reported as [`CommandError::Unknown`]
    /// so the caller can log and move on.
    pub fn from_json(json: &str) -> Result<Self, CommandError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| CommandError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, CommandError> {
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CommandError::Malformed("missing \"type\" tag".to_string()))?
            .to_string();

        if !KNOWN_COMMANDS.contains(&tag.as_str()) {
            return Err(CommandError::Unknown(tag));
        }
        serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))
    }
}

const KNOWN_COMMANDS: &[&str] = &["register_consumer", "dismiss", "clear_missed_calls"];

/// Errors decoding a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("unknown consumer identity: {0}")]
    UnknownIdentity(String),
    #[error("malformed command: {0}")]
    Malformed(String),
}
