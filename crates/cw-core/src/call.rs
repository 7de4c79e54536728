//! Call state tracking and missed-call detection.
//!
//! A missed call is recognised from telephony state transitions alone: the
//! line rang and went back to idle without ever going off-hook. This does not
//! depend on the dialer posting its own missed-call notification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Raw telephony state code for an idle line.
pub const RAW_STATE_IDLE: i32 = 0;
/// Raw telephony state code for a ringing line.
pub const RAW_STATE_RINGING: i32 = 1;
/// Raw telephony state code for a line with an active or dialing call.
pub const RAW_STATE_OFFHOOK: i32 = 2;

/// Placeholder reported when the telephony source gives no number.
pub const UNKNOWN_NUMBER: &str = "unknown_number";

/// Line state as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    OffHook,
}

impl CallState {
    /// Decodes a raw telephony state code.
    ///
    /// Returns `None` for codes this tracker does not know.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            RAW_STATE_IDLE => Some(Self::Idle),
            RAW_STATE_RINGING => Some(Self::Ringing),
            RAW_STATE_OFFHOOK => Some(Self::OffHook),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Ringing => "RINGING",
            Self::OffHook => "OFFHOOK",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a raw state code for logs, including codes outside the known set.
#[must_use]
pub fn raw_state_name(raw: i32) -> String {
    CallState::from_raw(raw).map_or_else(|| format!("UNKNOWN_STATE_{raw}"), |s| s.to_string())
}

/// A raw state change as delivered by the telephony source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephonyEvent {
    /// Raw state code (see the `RAW_STATE_*` constants).
    pub state: i32,
    /// Incoming number, empty when the source did not provide one.
    #[serde(default)]
    pub number: String,
}

impl TelephonyEvent {
    pub fn new(state: i32, number: impl Into<String>) -> Self {
        Self {
            state,
            number: number.into(),
        }
    }
}

/// What happened on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventKind {
    IncomingCall,
    CallOngoing,
    MissedCall,
}

impl CallEventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IncomingCall => "incoming_call",
            Self::CallOngoing => "call_ongoing",
            Self::MissedCall => "missed_call",
        }
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call event derived from telephony transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub kind: CallEventKind,
    /// The caller, or [`UNKNOWN_NUMBER`] when it could not be determined.
    pub number: String,
    /// The default dialer package, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialer_package: Option<String>,
}

impl CallEvent {
    #[must_use]
    pub fn is_missed(&self) -> bool {
        self.kind == CallEventKind::MissedCall
    }
}

/// Three-state call machine with a ringing flag.
///
/// The flag is set on entering `Ringing` and cleared by `OffHook`, `Idle`,
/// or an unknown raw state. `Idle` with the flag still set is a missed call.
#[derive(Debug, Clone, Default)]
pub struct CallTracker {
    state: CallState,
    ringing: bool,
    ringing_number: Option<String>,
    dialer_package: Option<String>,
}

impl CallTracker {
    pub fn new(dialer_package: Option<String>) -> Self {
        Self {
            dialer_package,
            ..Self::default()
        }
    }

    pub const fn state(&self) -> CallState {
        self.state
    }

    pub const fn is_ringing(&self) -> bool {
        self.ringing
    }

    /// Applies one raw state change and returns the derived event, if any.
    pub fn on_state_changed(&mut self, event: &TelephonyEvent) -> Option<CallEvent> {
        tracing::debug!(
            state = %raw_state_name(event.state),
            number = %self.number_for(&event.number),
            ringing_before = self.ringing,
            "call state changed"
        );

        let emitted = match CallState::from_raw(event.state) {
            Some(CallState::Ringing) => {
                self.state = CallState::Ringing;
                self.ringing = true;
                if !event.number.is_empty() {
                    self.ringing_number = Some(event.number.clone());
                }
                let emitted = self.event(CallEventKind::IncomingCall, &event.number);
                tracing::info!(number = %emitted.number, dialer = ?self.dialer_package, "incoming call");
                Some(emitted)
            }
            Some(CallState::OffHook) => {
                self.state = CallState::OffHook;
                self.ringing = false;
                let emitted = self.event(CallEventKind::CallOngoing, &event.number);
                tracing::info!(number = %emitted.number, dialer = ?self.dialer_package, "call ongoing");
                Some(emitted)
            }
            Some(CallState::Idle) => {
                let emitted = self.ringing.then(|| {
                    let missed = self.event(CallEventKind::MissedCall, &event.number);
                    tracing::info!(number = %missed.number, dialer = ?self.dialer_package, "missed call");
                    missed
                });
                self.state = CallState::Idle;
                self.ringing = false;
                self.ringing_number = None;
                emitted
            }
            None => {
                tracing::warn!(
                    error = %RelayError::UnknownRawState(event.state),
                    "ignoring call state"
                );
                self.ringing = false;
                None
            }
        };

        tracing::debug!(ringing_after = self.ringing, "call state applied");
        emitted
    }

    fn number_for(&self, reported: &str) -> String {
        if !reported.is_empty() {
            return reported.to_string();
        }
        self.ringing_number
            .clone()
            .unwrap_or_else(|| UNKNOWN_NUMBER.to_string())
    }

    fn event(&self, kind: CallEventKind, reported: &str) -> CallEvent {
        CallEvent {
            kind,
            number: self.number_for(reported),
            dialer_package: self.dialer_package.clone(),
        }
    }
}
