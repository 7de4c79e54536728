//! In-memory device for tests and scenario replay.
//!
//! Implements every platform trait over plain collections so the relay can
//! be driven without a phone. Permissions can be toggled at any time to
//! reproduce revocation in the middle of a session.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::lock::ScreenLock;
use crate::notification::NativeNotification;
use crate::projection::RelayMessage;
use crate::source::{
    ConsumerSink, NotificationSource, PackageLabels, SourceError, TelephonySource,
};
use crate::types::NotificationKey;

#[derive(Debug)]
struct DeviceState {
    active: Vec<NativeNotification>,
    notification_access: bool,
    phone_state_permission: bool,
    subscribed: bool,
    labels: HashMap<String, String>,
    delivered: Vec<RelayMessage>,
    cancelled: Vec<NotificationKey>,
    pending_removals: Vec<NativeNotification>,
    uncancellable: HashSet<NotificationKey>,
    screen_locks: usize,
}

/// A simulated device: notification shade, telephony, package manager and
/// the consumer side of the relay.
#[derive(Debug)]
pub struct InMemoryDevice {
    state: Mutex<DeviceState>,
}

impl Default for InMemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDevice {
    /// Creates a device with every permission granted and nothing posted.
    pub fn new() -> Self {
        Self::with_labels(HashMap::new())
    }

    pub fn with_labels(labels: HashMap<String, String>) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                active: Vec::new(),
                notification_access: true,
                phone_state_permission: true,
                subscribed: false,
                labels,
                delivered: Vec::new(),
                cancelled: Vec::new(),
                pending_removals: Vec::new(),
                uncancellable: HashSet::new(),
                screen_locks: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Posts a notification. Reposting an active key updates it in place.
    pub fn post(&self, notification: NativeNotification) {
        let mut state = self.lock();
        if let Some(slot) = state.active.iter_mut().find(|n| n.key == notification.key) {
            *slot = notification;
        } else {
            state.active.push(notification);
        }
    }

    /// Removes a notification, returning it if it was active.
    pub fn remove(&self, key: &NotificationKey) -> Option<NativeNotification> {
        let mut state = self.lock();
        let index = state.active.iter().position(|n| &n.key == key)?;
        Some(state.active.remove(index))
    }

    pub fn active_keys(&self) -> Vec<NotificationKey> {
        self.lock().active.iter().map(|n| n.key.clone()).collect()
    }

    pub fn set_notification_access(&self, granted: bool) {
        self.lock().notification_access = granted;
    }

    pub fn set_phone_state_permission(&self, granted: bool) {
        self.lock().phone_state_permission = granted;
    }

    pub fn set_label(&self, package: impl Into<String>, label: impl Into<String>) {
        self.lock().labels.insert(package.into(), label.into());
    }

    /// Makes every later cancel of `key` fail as a platform error.
    pub fn refuse_cancel(&self, key: NotificationKey) {
        self.lock().uncancellable.insert(key);
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().subscribed
    }

    /// Every message delivered so far, oldest first.
    pub fn delivered(&self) -> Vec<RelayMessage> {
        self.lock().delivered.clone()
    }

    /// Drains the delivered messages.
    pub fn take_delivered(&self) -> Vec<RelayMessage> {
        std::mem::take(&mut self.lock().delivered)
    }

    /// Keys passed to [`NotificationSource::cancel`] that were active at the time.
    pub fn cancelled(&self) -> Vec<NotificationKey> {
        self.lock().cancelled.clone()
    }

    /// Drains the removal callbacks owed to the listener for cancelled notifications.
    pub fn take_removals(&self) -> Vec<NativeNotification> {
        std::mem::take(&mut self.lock().pending_removals)
    }

    /// Number of times the screen was locked.
    pub fn screen_locks(&self) -> usize {
        self.lock().screen_locks
    }
}

impl TelephonySource for InMemoryDevice {
    fn subscribe(&self) -> Result<(), SourceError> {
        let mut state = self.lock();
        if !state.phone_state_permission {
            return Err(SourceError::PermissionDenied {
                capability: "read phone state",
            });
        }
        state.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&self) {
        self.lock().subscribed = false;
    }
}

impl NotificationSource for InMemoryDevice {
    fn active_notifications(&self) -> Result<Vec<NativeNotification>, SourceError> {
        let state = self.lock();
        if !state.notification_access {
            return Err(SourceError::PermissionDenied {
                capability: "notification access",
            });
        }
        Ok(state.active.clone())
    }

    fn cancel(&self, key: &NotificationKey) -> Result<(), SourceError> {
        let mut state = self.lock();
        if !state.notification_access {
            return Err(SourceError::PermissionDenied {
                capability: "notification access",
            });
        }
        if state.uncancellable.contains(key) {
            return Err(SourceError::Unavailable(format!("cannot cancel {key}")));
        }
        if let Some(index) = state.active.iter().position(|n| &n.key == key) {
            let removed = state.active.remove(index);
            state.cancelled.push(key.clone());
            state.pending_removals.push(removed);
        }
        Ok(())
    }
}

impl PackageLabels for InMemoryDevice {
    fn application_label(&self, package: &str) -> Result<String, SourceError> {
        self.lock()
            .labels
            .get(package)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("package not found: {package}")))
    }
}

impl ConsumerSink for InMemoryDevice {
    fn deliver(&self, message: RelayMessage) -> Result<(), SourceError> {
        self.lock().delivered.push(message);
        Ok(())
    }
}

impl ScreenLock for InMemoryDevice {
    fn lock_screen(&self) -> bool {
        self.lock().screen_locks += 1;
        true
    }
}
