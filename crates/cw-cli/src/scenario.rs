//! Scenario files for `cw replay`.
//!
//! A scenario is JSONL: one step per line, tagged by `step`. Blank lines and
//! lines starting with `#` are skipped.

use std::path::Path;

use anyhow::{Context, Result};
use cw_core::{NativeNotification, NotificationKey};
use serde::{Deserialize, Serialize};

/// One thing that happens on the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// The notification listener connects.
    Connect,
    /// The notification listener disconnects.
    Disconnect,
    /// An app posts (or updates) a notification.
    Post { notification: NativeNotification },
    /// A notification goes away on its own.
    Remove { key: NotificationKey },
    /// The line changes state.
    Call {
        state: i32,
        #[serde(default)]
        number: String,
    },
    /// The application sends a control command (kept raw so unknown tags
    /// reach the relay).
    Command { command: serde_json::Value },
    RevokeNotificationAccess,
    GrantNotificationAccess,
    DenyPhoneState,
    GrantPhoneState,
    /// The accessibility service binds.
    BindLockService,
    /// The accessibility service unbinds.
    UnbindLockService,
    LockScreen,
}

impl Step {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Post { .. } => "post",
            Self::Remove { .. } => "remove",
            Self::Call { .. } => "call",
            Self::Command { .. } => "command",
            Self::RevokeNotificationAccess => "revoke_notification_access",
            Self::GrantNotificationAccess => "grant_notification_access",
            Self::DenyPhoneState => "deny_phone_state",
            Self::GrantPhoneState => "grant_phone_state",
            Self::BindLockService => "bind_lock_service",
            Self::UnbindLockService => "unbind_lock_service",
            Self::LockScreen => "lock_screen",
        }
    }
}

/// Parses scenario text.
pub fn parse(content: &str) -> Result<Vec<Step>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid scenario step on line {}", index + 1))
        })
        .collect()
}

/// Reads and parses a scenario file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    parse(&content)
}
