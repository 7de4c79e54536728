//! Replay command: drives the relay through a scenario on a simulated device.
//!
//! Every step is applied, then the relay queue is drained before the next
//! step, so the transcript attributes each delivery and call event to the
//! step that caused it. Notifications cancelled by the relay are fed back as
//! removal events, the way the OS reports its own cancellations.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cw_core::memory::InMemoryDevice;
use cw_core::{
    CallEvent, Collaborators, Input, PackageName, RelayHandle, RelayMessage, RelayService,
    RelayStatus, ScreenLockSlot, TelephonyEvent,
};
use serde::Serialize;

use crate::Config;
use crate::scenario::{self, Step};

/// Something observable that a step caused.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Outcome {
    Call { call: CallEvent },
    Delivered { message: RelayMessage },
    ScreenLock { locked: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// 1-based index of the step in the scenario.
    pub step: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub entries: Vec<Entry>,
    pub status: RelayStatus,
}

pub fn run<W: Write>(writer: &mut W, config: &Config, scenario: &Path, json: bool) -> Result<()> {
    let steps = scenario::load(scenario)?;
    tracing::debug!(steps = steps.len(), path = %scenario.display(), "loaded scenario");

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let transcript = runtime.block_on(replay(config, steps))?;

    if json {
        write_json(writer, &transcript)
    } else {
        write_text(writer, &transcript)
    }
}

/// Replays steps against a fresh simulated device.
pub async fn replay(config: &Config, steps: Vec<Step>) -> Result<Transcript> {
    let labels: HashMap<String, String> = config.labels.clone().into_iter().collect();
    let device = Arc::new(InMemoryDevice::with_labels(labels));
    let lock_slot = ScreenLockSlot::new();

    let (handle, task) =
        RelayService::spawn(config.relay.clone(), Collaborators::from_device(&device));
    let mut calls = handle.subscribe_calls();
    let mut entries = Vec::new();

    for (index, step) in steps.into_iter().enumerate() {
        let number = index + 1;
        tracing::debug!(step = number, name = step.name(), "applying step");

        if let Some(locked) = apply(&device, &lock_slot, &handle, step).await? {
            entries.push(Entry {
                step: number,
                outcome: Outcome::ScreenLock { locked },
            });
        }
        settle(&device, &handle).await?;

        while let Ok(call) = calls.try_recv() {
            entries.push(Entry {
                step: number,
                outcome: Outcome::Call { call },
            });
        }
        for message in device.take_delivered() {
            entries.push(Entry {
                step: number,
                outcome: Outcome::Delivered { message },
            });
        }
    }

    handle.shutdown().await?;
    let status = task.await.context("relay task failed")?;
    Ok(Transcript { entries, status })
}

async fn apply(
    device: &Arc<InMemoryDevice>,
    lock_slot: &ScreenLockSlot,
    handle: &RelayHandle,
    step: Step,
) -> Result<Option<bool>> {
    match step {
        Step::Connect => handle.listener_connected().await?,
        Step::Disconnect => handle.listener_disconnected().await?,
        Step::Post { notification } => {
            device.post(notification.clone());
            handle.notification_posted(notification).await?;
        }
        Step::Remove { key } => match device.remove(&key) {
            Some(removed) => handle.notification_removed(removed).await?,
            None => tracing::warn!(%key, "scenario removes a notification that is not active"),
        },
        Step::Call { state, number } => {
            handle
                .call_state_changed(TelephonyEvent::new(state, number))
                .await?;
        }
        Step::Command { command } => handle.send(Input::RawCommand(command)).await?,
        Step::RevokeNotificationAccess => device.set_notification_access(false),
        Step::GrantNotificationAccess => device.set_notification_access(true),
        Step::DenyPhoneState => device.set_phone_state_permission(false),
        Step::GrantPhoneState => device.set_phone_state_permission(true),
        Step::BindLockService => lock_slot.connect(device.clone()),
        Step::UnbindLockService => lock_slot.disconnect(),
        Step::LockScreen => return Ok(Some(lock_slot.lock_screen())),
    }
    Ok(None)
}

/// Waits for the relay to go idle, feeding back removals it caused.
async fn settle(device: &InMemoryDevice, handle: &RelayHandle) -> Result<()> {
    loop {
        handle.status().await?;
        let removals = device.take_removals();
        if removals.is_empty() {
            return Ok(());
        }
        for removed in removals {
            handle.notification_removed(removed).await?;
        }
    }
}

fn write_json<W: Write>(writer: &mut W, transcript: &Transcript) -> Result<()> {
    for entry in &transcript.entries {
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
    }
    writeln!(
        writer,
        "{}",
        serde_json::json!({ "status": transcript.status })
    )?;
    Ok(())
}

fn write_text<W: Write>(writer: &mut W, transcript: &Transcript) -> Result<()> {
    for entry in &transcript.entries {
        let step = entry.step;
        match &entry.outcome {
            Outcome::Call { call } => writeln!(writer, "[{step}] {} {}", call.kind, call.number)?,
            Outcome::Delivered {
                message: RelayMessage::Detailed { notifications },
            } => {
                writeln!(writer, "[{step}] delivered detailed ({})", notifications.len())?;
                for n in notifications {
                    writeln!(
                        writer,
                        "    {} {} ({}): {}",
                        n.key,
                        n.package_name,
                        n.app_name,
                        n.title.as_deref().unwrap_or("-")
                    )?;
                }
            }
            Outcome::Delivered {
                message: RelayMessage::Summary(summary),
            } => {
                if summary.packages.is_empty() {
                    writeln!(writer, "[{step}] delivered summary (0)")?;
                } else {
                    let packages: Vec<_> =
                        summary.packages.iter().map(PackageName::as_str).collect();
                    writeln!(
                        writer,
                        "[{step}] delivered summary ({}): {}",
                        summary.count,
                        packages.join(", ")
                    )?;
                }
            }
            Outcome::ScreenLock { locked } => {
                let result = if *locked { "locked" } else { "not locked" };
                writeln!(writer, "[{step}] screen {result}")?;
            }
        }
    }

    let status = &transcript.status;
    writeln!(
        writer,
        "listening: {}, consumer: {}, call state: {}, telephony subscribed: {}",
        status.listening, status.consumer, status.call_state, status.telephony_subscribed
    )?;
    Ok(())
}
