//! The relay state machine.
//!
//! [`Relay`] owns every piece of mutable state in the subsystem: the call
//! tracker, the registered consumer and the listening flag. It is driven one
//! [`Input`] at a time, so whoever owns it (normally
//! [`crate::service::RelayService`]) provides the serialization.
//!
//! # Triggers
//!
//! A relay pass runs after a notification is posted or removed, after a
//! consumer registers, and once on connect. It only delivers while the
//! listener is connected and a consumer is registered. Missed-call cleanup
//! runs after every missed call and on [`Command::ClearMissedCalls`],
//! independent of both.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::call::{CallEvent, CallState, CallTracker, TelephonyEvent};
use crate::command::{Command, ConsumerIdentity};
use crate::error::RelayError;
use crate::mirror::{MISSED_CALL_CATEGORY, NotificationMirror};
use crate::notification::NativeNotification;
use crate::projection::{self, RelayMessage, UNKNOWN_APP_LABEL};
use crate::source::{Collaborators, ConsumerSink, PackageLabels, TelephonySource};
use crate::types::NotificationKey;

/// Tunables for a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Category tag identifying missed-call notifications.
    pub missed_call_category: String,
    /// Label shown when an application label cannot be resolved.
    pub unknown_app_label: String,
    /// Default dialer package attached to call events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialer_package: Option<String>,
    /// Capacity of the serialized input queue.
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            missed_call_category: MISSED_CALL_CATEGORY.to_string(),
            unknown_app_label: UNKNOWN_APP_LABEL.to_string(),
            dialer_package: None,
            queue_capacity: 64,
        }
    }
}

/// Everything the relay reacts to.
#[derive(Debug, Clone)]
pub enum Input {
    /// The notification listener connected to the OS stream.
    ListenerConnected,
    /// The notification listener lost its connection.
    ListenerDisconnected,
    /// A notification was posted or updated. `None` when the OS sent no payload.
    NotificationPosted(Option<NativeNotification>),
    /// A notification was removed. `None` when the OS sent no payload.
    NotificationRemoved(Option<NativeNotification>),
    /// A raw telephony state change.
    CallStateChanged(TelephonyEvent),
    /// A decoded control command.
    Command(Command),
    /// An undecoded control command, as received from the application.
    RawCommand(serde_json::Value),
}

/// Point-in-time view of the relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatus {
    pub listening: bool,
    pub consumer: ConsumerIdentity,
    pub call_state: CallState,
    pub telephony_subscribed: bool,
}

pub struct Relay {
    config: RelayConfig,
    tracker: CallTracker,
    telephony: Arc<dyn TelephonySource>,
    telephony_subscribed: bool,
    mirror: NotificationMirror,
    labels: Arc<dyn PackageLabels>,
    sink: Arc<dyn ConsumerSink>,
    consumer: ConsumerIdentity,
    listening: bool,
}

impl Relay {
    pub fn new(config: RelayConfig, collaborators: Collaborators) -> Self {
        Self {
            tracker: CallTracker::new(config.dialer_package.clone()),
            telephony: collaborators.telephony,
            telephony_subscribed: false,
            mirror: NotificationMirror::new(
                collaborators.notifications,
                config.missed_call_category.clone(),
            ),
            labels: collaborators.labels,
            sink: collaborators.sink,
            consumer: ConsumerIdentity::None,
            listening: false,
            config,
        }
    }

    pub const fn status(&self) -> RelayStatus {
        RelayStatus {
            listening: self.listening,
            consumer: self.consumer,
            call_state: self.tracker.state(),
            telephony_subscribed: self.telephony_subscribed,
        }
    }

    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Processes one input to completion.
    ///
    /// Returns the call event the input produced, if any. Every collaborator
    /// failure is logged here and never returned.
    pub fn handle(&mut self, input: Input) -> Option<CallEvent> {
        match input {
            Input::ListenerConnected => self.on_connected(),
            Input::ListenerDisconnected => self.on_disconnected(),
            Input::NotificationPosted(notification) => {
                self.on_notification_changed("posted", notification.as_ref());
            }
            Input::NotificationRemoved(notification) => {
                self.on_notification_changed("removed", notification.as_ref());
            }
            Input::CallStateChanged(event) => return self.on_call_state(&event),
            Input::Command(command) => self.execute(command),
            Input::RawCommand(value) => match Command::from_value(value) {
                Ok(command) => self.execute(command),
                Err(e) => {
                    let err = RelayError::from(e);
                    tracing::warn!(error = %err, "ignoring command");
                }
            },
        }
        None
    }

    fn on_connected(&mut self) {
        if self.listening {
            tracing::debug!("listener already connected");
            return;
        }
        self.listening = true;
        tracing::info!("listener connected");

        match self.telephony.subscribe() {
            Ok(()) => {
                self.telephony_subscribed = true;
                tracing::info!("subscribed to call state changes");
            }
            Err(e) => {
                tracing::error!(error = %RelayError::from(e), "cannot subscribe to call state changes, missed call detection disabled");
            }
        }

        self.relay();
    }

    fn on_disconnected(&mut self) {
        if !self.listening {
            tracing::debug!("listener already disconnected");
            return;
        }
        self.listening = false;
        tracing::warn!("listener disconnected");

        if self.telephony_subscribed {
            self.telephony.unsubscribe();
            self.telephony_subscribed = false;
            tracing::info!("unsubscribed from call state changes");
        }
    }

    fn on_notification_changed(&self, change: &str, notification: Option<&NativeNotification>) {
        let Some(notification) = notification else {
            tracing::warn!(change, "notification event without payload");
            return;
        };
        tracing::debug!(
            change,
            package = %notification.package,
            id = notification.id,
            key = %notification.key,
            "notification changed"
        );
        self.relay();
    }

    fn on_call_state(&mut self, event: &TelephonyEvent) -> Option<CallEvent> {
        if !self.telephony_subscribed {
            tracing::debug!(state = event.state, "not subscribed to call state, ignoring");
            return None;
        }
        let emitted = self.tracker.on_state_changed(event)?;
        if emitted.is_missed() {
            self.clear_missed_calls();
        }
        Some(emitted)
    }

    /// Applies a control command.
    pub fn execute(&mut self, command: Command) {
        tracing::debug!(command = command.name(), "received command");
        match command {
            Command::RegisterConsumer { identity } => {
                tracing::info!(from = %self.consumer, to = %identity, "consumer registered");
                self.consumer = identity;
                self.relay();
            }
            Command::Dismiss { key } => {
                if let Err(e) = self.mirror.dismiss(&key) {
                    tracing::error!(%key, error = %RelayError::from(e), "failed to dismiss notification");
                }
            }
            Command::ClearMissedCalls => {
                self.clear_missed_calls();
            }
        }
    }

    /// Runs one relay pass, logging any failure.
    pub fn relay(&self) {
        match self.try_relay() {
            Ok(Some(message)) => {
                tracing::debug!(consumer = %self.consumer, notifications = message.len(), "relay delivered");
            }
            Ok(None) => {}
            Err(e) => tracing::error!(consumer = %self.consumer, error = %e, "relay aborted"),
        }
    }

    /// Runs one relay pass.
    ///
    /// Returns the delivered message, or `None` when there was nobody to
    /// deliver to.
    pub fn try_relay(&self) -> Result<Option<RelayMessage>, RelayError> {
        if !self.listening {
            tracing::warn!("listener not connected, skipping relay");
            return Ok(None);
        }

        let message = match self.consumer {
            ConsumerIdentity::None => {
                tracing::debug!("no consumer registered");
                return Ok(None);
            }
            ConsumerIdentity::Detailed => projection::detailed(
                self.mirror.snapshot()?,
                self.labels.as_ref(),
                &self.config.unknown_app_label,
            ),
            ConsumerIdentity::Summary => projection::summary(self.mirror.snapshot()?),
        };

        self.sink
            .deliver(message.clone())
            .map_err(|e| RelayError::Delivery(e.to_string()))?;
        Ok(Some(message))
    }

    /// Dismisses every clearable missed-call notification, logging failures.
    pub fn clear_missed_calls(&self) -> Vec<NotificationKey> {
        match self.try_clear_missed_calls() {
            Ok(cleared) => cleared,
            Err(e) => {
                tracing::error!(error = %e, "missed call cleanup aborted");
                Vec::new()
            }
        }
    }

    /// Dismisses every clearable missed-call notification.
    ///
    /// Returns the keys that were dismissed. A failed snapshot aborts the
    /// whole pass; a failed dismissal is logged and the pass continues.
    pub fn try_clear_missed_calls(&self) -> Result<Vec<NotificationKey>, RelayError> {
        let mut cleared = Vec::new();
        for record in self.mirror.snapshot()? {
            if !self.mirror.is_missed_call_category(&record) {
                continue;
            }
            if !NotificationMirror::is_clearable(&record) {
                tracing::info!(key = %record.key, "missed call notification is not clearable");
                continue;
            }
            match self.mirror.dismiss(&record.key) {
                Ok(()) => {
                    tracing::info!(key = %record.key, package = %record.package_name, "cleared missed call notification");
                    cleared.push(record.key);
                }
                Err(e) => {
                    tracing::error!(key = %record.key, error = %RelayError::from(e), "failed to clear missed call notification");
                }
            }
        }
        Ok(cleared)
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("status", &self.status())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
