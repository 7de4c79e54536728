//! Native notifications and the records decoded from them.

use std::ops::BitOr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActionHandle, IconHandle, NotificationKey, PackageName};

/// Notification flag bits as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationFlags(u32);

impl NotificationFlags {
    pub const NONE: Self = Self(0);
    /// The notification represents an ongoing activity (a call, a download).
    pub const ONGOING_EVENT: Self = Self(0x0000_0002);
    /// The notification survives "clear all".
    pub const NO_CLEAR: Self = Self(0x0000_0020);
    /// The notification summarises a group of notifications.
    pub const GROUP_SUMMARY: Self = Self(0x0000_0200);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for NotificationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A notification exactly as the OS reports it.
///
/// Everything except `key` and `package` is optional because apps are free
/// to post notifications without a title, text, icon or actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeNotification {
    pub key: NotificationKey,
    pub package: PackageName,
    /// Per-package notification id.
    #[serde(default)]
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Post time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub when: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_icon: Option<IconHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<IconHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_intent: Option<ActionHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_intent: Option<ActionHandle>,
    #[serde(default)]
    pub flags: NotificationFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl NativeNotification {
    /// Creates a bare notification with no content, flags or category.
    pub fn new(key: NotificationKey, package: PackageName) -> Self {
        Self {
            key,
            package,
            id: 0,
            title: None,
            text: None,
            when: 0,
            small_icon: None,
            large_icon: None,
            content_intent: None,
            delete_intent: None,
            flags: NotificationFlags::NONE,
            category: None,
        }
    }
}

/// Read-only view over one live notification, built for a single relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub key: NotificationKey,
    pub package_name: PackageName,
    pub title: Option<String>,
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub small_icon: Option<IconHandle>,
    pub large_icon: Option<IconHandle>,
    pub click_action: Option<ActionHandle>,
    pub dismiss_action: Option<ActionHandle>,
    /// No "no-clear" flag.
    pub clearable: bool,
    /// The "ongoing" flag is set.
    pub ongoing: bool,
    pub is_group_summary: bool,
    pub category: Option<String>,
}

impl NotificationRecord {
    /// Decodes a native notification.
    ///
    /// A post time outside chrono's representable range decodes to the epoch.
    pub fn decode(native: NativeNotification) -> Self {
        let timestamp = DateTime::from_timestamp_millis(native.when).unwrap_or_else(|| {
            tracing::warn!(key = %native.key, when = native.when, "notification time out of range");
            DateTime::<Utc>::UNIX_EPOCH
        });

        Self {
            clearable: !native.flags.contains(NotificationFlags::NO_CLEAR),
            ongoing: native.flags.contains(NotificationFlags::ONGOING_EVENT),
            is_group_summary: native.flags.contains(NotificationFlags::GROUP_SUMMARY),
            key: native.key,
            package_name: native.package,
            title: native.title,
            body: native.text,
            timestamp,
            small_icon: native.small_icon,
            large_icon: native.large_icon,
            click_action: native.content_intent,
            dismiss_action: native.delete_intent,
            category: native.category,
        }
    }
}
