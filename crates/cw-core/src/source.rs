//! Interfaces to the hosting platform.
//!
//! The relay never talks to the OS directly. Every query and action goes
//! through one of these traits so the state machine can run against a real
//! device bridge or against [`crate::memory::InMemoryDevice`].

use std::sync::Arc;

use thiserror::Error;

use crate::notification::NativeNotification;
use crate::projection::RelayMessage;
use crate::types::NotificationKey;

/// Failure reported by a platform collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A required capability (phone state, notification access) is missing.
    #[error("permission denied: {capability}")]
    PermissionDenied { capability: &'static str },
    /// The platform call failed for any other reason.
    #[error("platform call failed: {0}")]
    Unavailable(String),
}

/// Subscription to raw telephony state changes.
///
/// While subscribed, the host forwards each change to the relay as
/// [`crate::Input::CallStateChanged`].
pub trait TelephonySource: Send + Sync {
    fn subscribe(&self) -> Result<(), SourceError>;
    fn unsubscribe(&self);
}

/// Live access to the OS notification shade.
pub trait NotificationSource: Send + Sync {
    /// Returns the notifications currently active, in OS order.
    fn active_notifications(&self) -> Result<Vec<NativeNotification>, SourceError>;

    /// Cancels the notification with the given key.
    ///
    /// Cancelling a key that is no longer active must succeed.
    fn cancel(&self, key: &NotificationKey) -> Result<(), SourceError>;
}

/// Package metadata lookup.
pub trait PackageLabels: Send + Sync {
    /// Returns the human-readable label of an installed application.
    fn application_label(&self, package: &str) -> Result<String, SourceError>;
}

/// The foreground surface side of the relay.
pub trait ConsumerSink: Send + Sync {
    fn deliver(&self, message: RelayMessage) -> Result<(), SourceError>;
}

/// The set of platform collaborators a relay is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub telephony: Arc<dyn TelephonySource>,
    pub notifications: Arc<dyn NotificationSource>,
    pub labels: Arc<dyn PackageLabels>,
    pub sink: Arc<dyn ConsumerSink>,
}

impl Collaborators {
    /// Wires every collaborator to the same device object.
    pub fn from_device<D>(device: &Arc<D>) -> Self
    where
        D: TelephonySource + NotificationSource + PackageLabels + ConsumerSink + 'static,
    {
        Self {
            telephony: device.clone(),
            notifications: device.clone(),
            labels: device.clone(),
            sink: device.clone(),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
