//! On-demand view of the active notification set.
//!
//! Nothing is cached here. Each [`NotificationMirror::snapshot`] asks the
//! platform again, so a relay can never be built from a stale list.

use std::sync::Arc;

use crate::notification::NotificationRecord;
use crate::source::{NotificationSource, SourceError};
use crate::types::NotificationKey;

/// Category tag the OS uses for missed-call notifications.
pub const MISSED_CALL_CATEGORY: &str = "missed_call";

pub struct NotificationMirror {
    source: Arc<dyn NotificationSource>,
    missed_call_category: String,
}

impl NotificationMirror {
    pub fn new(source: Arc<dyn NotificationSource>, missed_call_category: impl Into<String>) -> Self {
        Self {
            source,
            missed_call_category: missed_call_category.into(),
        }
    }

    /// Pulls and decodes the current active set, in OS order.
    pub fn snapshot(&self) -> Result<Vec<NotificationRecord>, SourceError> {
        let natives = self.source.active_notifications()?;
        Ok(natives.into_iter().map(NotificationRecord::decode).collect())
    }

    pub fn is_missed_call_category(&self, record: &NotificationRecord) -> bool {
        record.category.as_deref() == Some(self.missed_call_category.as_str())
    }

    /// Neither "no-clear" nor "ongoing".
    pub const fn is_clearable(record: &NotificationRecord) -> bool {
        record.clearable && !record.ongoing
    }

    /// Asks the platform to cancel a notification. Absent keys are a no-op.
    pub fn dismiss(&self, key: &NotificationKey) -> Result<(), SourceError> {
        self.source.cancel(key)?;
        tracing::info!(%key, "notification dismissed");
        Ok(())
    }
}

impl std::fmt::Debug for NotificationMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationMirror")
            .field("missed_call_category", &self.missed_call_category)
            .finish_non_exhaustive()
    }
}
