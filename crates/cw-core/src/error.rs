//! Failure taxonomy of the relay.
//!
//! None of these escape into the host: the relay logs each one where the
//! collaborator was called and carries on with the next input.

use thiserror::Error;

use crate::command::CommandError;
use crate::source::SourceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A capability is missing; the dependent feature goes inert.
    #[error("permission denied: {capability}")]
    PermissionDenied { capability: &'static str },

    /// A snapshot or dismissal failed; only the current attempt is aborted.
    #[error("platform query failed: {0}")]
    TransientQuery(String),

    /// A command tag outside the known set.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A raw telephony state outside the known set.
    #[error("unknown raw call state: {0}")]
    UnknownRawState(i32),

    /// The consumer refused a relay message.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The relay task has stopped.
    #[error("relay service closed")]
    Closed,
}

impl From<SourceError> for RelayError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::PermissionDenied { capability } => Self::PermissionDenied { capability },
            SourceError::Unavailable(msg) => Self::TransientQuery(msg),
        }
    }
}

impl From<CommandError> for RelayError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Unknown(tag) => Self::UnknownCommand(tag),
            other => Self::UnknownCommand(other.to_string()),
        }
    }
}
