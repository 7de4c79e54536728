//! Serialized relay task.
//!
//! Telephony callbacks, notification callbacks and commands all arrive on
//! different host threads. They are funnelled through one bounded queue and
//! a single task applies them to the [`Relay`] in arrival order, so no two
//! triggers ever touch the relay state at the same time.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::call::{CallEvent, TelephonyEvent};
use crate::command::{Command, ConsumerIdentity};
use crate::error::RelayError;
use crate::notification::NativeNotification;
use crate::relay::{Input, Relay, RelayConfig, RelayStatus};
use crate::source::Collaborators;
use crate::types::NotificationKey;

/// Capacity of the call event broadcast; slow observers lose the oldest events.
const CALL_EVENT_CAPACITY: usize = 32;

#[derive(Debug)]
enum Message {
    Input(Input),
    Status(oneshot::Sender<RelayStatus>),
    Shutdown,
}

/// Owns the relay and drains its input queue.
#[derive(Debug)]
pub struct RelayService {
    relay: Relay,
    inputs: mpsc::Receiver<Message>,
    call_events: broadcast::Sender<CallEvent>,
}

/// Cheap, cloneable entry point into a running [`RelayService`].
#[derive(Debug, Clone)]
pub struct RelayHandle {
    inputs: mpsc::Sender<Message>,
    call_events: broadcast::Sender<CallEvent>,
}

impl RelayService {
    pub fn new(config: RelayConfig, collaborators: Collaborators) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (call_events, _) = broadcast::channel(CALL_EVENT_CAPACITY);
        let service = Self {
            relay: Relay::new(config, collaborators),
            inputs: rx,
            call_events: call_events.clone(),
        };
        let handle = RelayHandle {
            inputs: tx,
            call_events,
        };
        (service, handle)
    }

    /// Starts the service on the current tokio runtime.
    ///
    /// The task ends on [`RelayHandle::shutdown`] or once every handle is
    /// dropped, and yields the final relay status.
    pub fn spawn(
        config: RelayConfig,
        collaborators: Collaborators,
    ) -> (RelayHandle, JoinHandle<RelayStatus>) {
        let (service, handle) = Self::new(config, collaborators);
        (handle, tokio::spawn(service.run()))
    }

    pub async fn run(mut self) -> RelayStatus {
        tracing::debug!("relay service started");
        while let Some(message) = self.inputs.recv().await {
            match message {
                Message::Input(input) => {
                    if let Some(event) = self.relay.handle(input) {
                        // No receivers is fine: nobody is watching calls.
                        let _ = self.call_events.send(event);
                    }
                }
                Message::Status(reply) => {
                    let _ = reply.send(self.relay.status());
                }
                Message::Shutdown => break,
            }
        }
        let status = self.relay.status();
        tracing::debug!(?status, "relay service stopped");
        status
    }
}

impl RelayHandle {
    /// Queues an input behind everything already submitted.
    pub async fn send(&self, input: Input) -> Result<(), RelayError> {
        self.inputs
            .send(Message::Input(input))
            .await
            .map_err(|_| RelayError::Closed)
    }

    pub async fn listener_connected(&self) -> Result<(), RelayError> {
        self.send(Input::ListenerConnected).await
    }

    pub async fn listener_disconnected(&self) -> Result<(), RelayError> {
        self.send(Input::ListenerDisconnected).await
    }

    pub async fn notification_posted(
        &self,
        notification: NativeNotification,
    ) -> Result<(), RelayError> {
        self.send(Input::NotificationPosted(Some(notification))).await
    }

    pub async fn notification_removed(
        &self,
        notification: NativeNotification,
    ) -> Result<(), RelayError> {
        self.send(Input::NotificationRemoved(Some(notification))).await
    }

    pub async fn call_state_changed(&self, event: TelephonyEvent) -> Result<(), RelayError> {
        self.send(Input::CallStateChanged(event)).await
    }

    pub async fn register(&self, identity: ConsumerIdentity) -> Result<(), RelayError> {
        self.send(Input::Command(Command::RegisterConsumer { identity }))
            .await
    }

    pub async fn dismiss(&self, key: NotificationKey) -> Result<(), RelayError> {
        self.send(Input::Command(Command::Dismiss { key })).await
    }

    pub async fn clear_missed_calls(&self) -> Result<(), RelayError> {
        self.send(Input::Command(Command::ClearMissedCalls)).await
    }

    /// Observes call events produced from now on.
    pub fn subscribe_calls(&self) -> broadcast::Receiver<CallEvent> {
        self.call_events.subscribe()
    }

    /// Returns the relay status once every earlier input has been applied.
    pub async fn status(&self) -> Result<RelayStatus, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.inputs
            .send(Message::Status(tx))
            .await
            .map_err(|_| RelayError::Closed)?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    /// Stops the service after the inputs already queued.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        self.inputs
            .send(Message::Shutdown)
            .await
            .map_err(|_| RelayError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::call::{CallEventKind, RAW_STATE_IDLE, RAW_STATE_RINGING};
    use crate::memory::InMemoryDevice;
    use crate::notification::NotificationFlags;
    use crate::projection::RelayMessage;
    use crate::types::PackageName;

    fn spawn() -> (Arc<InMemoryDevice>, RelayHandle, JoinHandle<RelayStatus>) {
        let device = Arc::new(InMemoryDevice::new());
        let (handle, task) =
            RelayService::spawn(RelayConfig::default(), Collaborators::from_device(&device));
        (device, handle, task)
    }

    fn native(key: &str) -> NativeNotification {
        NativeNotification::new(
            NotificationKey::new(key).unwrap(),
            PackageName::new("com.whatsapp").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_inputs_apply_in_order() {
        let (device, handle, _task) = spawn();
        handle.listener_connected().await.unwrap();
        handle.register(ConsumerIdentity::Summary).await.unwrap();

        for key in ["a", "b", "c"] {
            device.post(native(key));
            handle.notification_posted(native(key)).await.unwrap();
            // Drain the queue so each pass sees exactly the posts before it.
            handle.status().await.unwrap();
        }
        let status = handle.status().await.unwrap();

        assert!(status.listening);
        assert_eq!(status.consumer, ConsumerIdentity::Summary);
        let counts: Vec<_> = device.delivered().iter().map(RelayMessage::len).collect();
        assert_eq!(counts, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missed_call_is_broadcast_and_cleans_up() {
        let (device, handle, _task) = spawn();
        let mut calls = handle.subscribe_calls();

        let mut dialer = NativeNotification::new(
            NotificationKey::new("missed").unwrap(),
            PackageName::new("com.android.dialer").unwrap(),
        );
        dialer.category = Some("missed_call".to_string());
        dialer.flags = NotificationFlags::NONE;
        device.post(dialer);

        handle.listener_connected().await.unwrap();
        handle
            .call_state_changed(TelephonyEvent::new(RAW_STATE_RINGING, "555-1234"))
            .await
            .unwrap();
        handle
            .call_state_changed(TelephonyEvent::new(RAW_STATE_IDLE, ""))
            .await
            .unwrap();
        handle.status().await.unwrap();

        let incoming = calls.recv().await.unwrap();
        assert_eq!(incoming.kind, CallEventKind::IncomingCall);
        let missed = calls.recv().await.unwrap();
        assert_eq!(missed.kind, CallEventKind::MissedCall);
        assert_eq!(missed.number, "555-1234");
        assert!(calls.try_recv().is_err());
        assert!(device.active_keys().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_returns_final_status() {
        let (_device, handle, task) = spawn();
        handle.listener_connected().await.unwrap();
        handle.register(ConsumerIdentity::Detailed).await.unwrap();
        handle.shutdown().await.unwrap();

        let status = task.await.unwrap();
        assert!(status.listening);
        assert_eq!(status.consumer, ConsumerIdentity::Detailed);
        assert!(matches!(handle.status().await, Err(RelayError::Closed)));
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_the_service() {
        let (_device, handle, task) = spawn();
        let clone = handle.clone();
        drop(handle);
        clone.listener_connected().await.unwrap();
        drop(clone);

        let status = task.await.unwrap();
        assert!(status.listening);
    }

    #[tokio::test]
    async fn test_concurrent_senders_are_serialized() {
        let (device, handle, _task) = spawn();
        handle.listener_connected().await.unwrap();
        handle.register(ConsumerIdentity::Summary).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            let device = device.clone();
            tasks.push(tokio::spawn(async move {
                let n = native(&format!("n{i}"));
                device.post(n.clone());
                handle.notification_posted(n).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        handle.status().await.unwrap();

        // Catch-up plus one relay per post, each a complete snapshot.
        let delivered = device.delivered();
        assert_eq!(delivered.len(), 9);
        assert_eq!(delivered.last().map(RelayMessage::len), Some(8));
    }
}
