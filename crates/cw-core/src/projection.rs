//! The two message shapes delivered to a registered consumer.

use serde::{Deserialize, Serialize};

use crate::notification::NotificationRecord;
use crate::source::PackageLabels;
use crate::types::{ActionHandle, IconHandle, NotificationKey, PackageName};

/// Label used when an application label cannot be resolved.
pub const UNKNOWN_APP_LABEL: &str = "(unknown)";

/// One notification as shown by the detailed consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedEntry {
    pub key: NotificationKey,
    pub package_name: PackageName,
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub timestamp_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_icon: Option<IconHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<IconHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_action: Option<ActionHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_action: Option<ActionHandle>,
    pub clearable: bool,
    pub is_summary: bool,
}

/// Aggregate view for the summary consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryProjection {
    pub count: usize,
    /// Owning package of every active notification, in OS order, duplicates kept.
    pub packages: Vec<PackageName>,
}

/// A single relay delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "consumer", rename_all = "snake_case")]
pub enum RelayMessage {
    Detailed { notifications: Vec<DetailedEntry> },
    Summary(SummaryProjection),
}

impl RelayMessage {
    /// Number of notifications the message describes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Detailed { notifications } => notifications.len(),
            Self::Summary(summary) => summary.count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves an application label, falling back to `fallback` on failure.
///
/// This is the only label lookup path in the crate.
pub fn app_name(labels: &dyn PackageLabels, package: &PackageName, fallback: &str) -> String {
    match labels.application_label(package.as_str()) {
        Ok(label) => label,
        Err(e) => {
            tracing::warn!(%package, error = %e, "app name not found for package");
            fallback.to_string()
        }
    }
}

/// Builds the full per-notification projection.
pub fn detailed(
    records: Vec<NotificationRecord>,
    labels: &dyn PackageLabels,
    unknown_label: &str,
) -> RelayMessage {
    let notifications = records
        .into_iter()
        .map(|record| {
            tracing::debug!(package = %record.package_name, key = %record.key, "projecting notification");
            DetailedEntry {
                app_name: app_name(labels, &record.package_name, unknown_label),
                timestamp_millis: record.timestamp.timestamp_millis(),
                key: record.key,
                package_name: record.package_name,
                title: record.title,
                body: record.body,
                small_icon: record.small_icon,
                large_icon: record.large_icon,
                click_action: record.click_action,
                dismiss_action: record.dismiss_action,
                clearable: record.clearable,
                is_summary: record.is_group_summary,
            }
        })
        .collect();
    RelayMessage::Detailed { notifications }
}

/// Builds the count-and-packages projection.
pub fn summary(records: Vec<NotificationRecord>) -> RelayMessage {
    let packages: Vec<_> = records.into_iter().map(|r| r.package_name).collect();
    RelayMessage::Summary(SummaryProjection {
        count: packages.len(),
        packages,
    })
}
