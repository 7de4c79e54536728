//! Call-state tracking and notification relay.
//!
//! This crate contains:
//! - Call tracking: detecting missed calls from raw telephony transitions
//! - Notification mirroring: on-demand snapshots of the active notification set
//! - Relaying: projecting that set to the one registered foreground consumer
//! - A serialized service that applies host events and commands in order

pub mod call;
pub mod command;
mod error;
pub mod lock;
pub mod memory;
pub mod mirror;
pub mod notification;
pub mod projection;
pub mod relay;
pub mod service;
pub mod source;
mod types;

pub use call::{CallEvent, CallEventKind, CallState, CallTracker, TelephonyEvent};
pub use command::{Command, CommandError, ConsumerIdentity};
pub use error::RelayError;
pub use lock::{ScreenLock, ScreenLockSlot};
pub use mirror::NotificationMirror;
pub use notification::{NativeNotification, NotificationFlags, NotificationRecord};
pub use projection::{DetailedEntry, RelayMessage, SummaryProjection};
pub use relay::{Input, Relay, RelayConfig, RelayStatus};
pub use service::{RelayHandle, RelayService};
pub use source::{
    Collaborators, ConsumerSink, NotificationSource, PackageLabels, SourceError, TelephonySource,
};
pub use types::{ActionHandle, IconHandle, NotificationKey, PackageName, ValidationError};
