//! Connection management for the push channel
//!
//! This module owns the background tasks of the live status client: the
//! reader task draining the channel, the connect/reconnect task with capped
//! exponential backoff, and the periodic refresh task.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::events::StatusEvent;
use crate::io::{ConnectionPair, Connector, MessageReader};
use crate::state::{new_state_handle, ConnectionStatus, StateHandle};
use crate::types::{ApiResponse, SnapshotPayload};

/// Text command requesting an immediate snapshot from the backend
pub(crate) const REFRESH_COMMAND: &str = "get";

/// Settings captured at `start` time for the lifetime of one session
#[derive(Clone)]
pub(crate) struct ConnectionSettings {
    pub endpoint: String,
    pub connection_timeout: Duration,
    pub poll_interval: Duration,
    pub reconnect: ReconnectConfig,
}

/// Shared state for connection management
///
/// Holds all the Arc-wrapped state shared between the client facade, the
/// reader task, the reconnect task, and the poll task.
#[derive(Clone)]
pub(crate) struct SharedConnectionState {
    pub state: StateHandle,
    pub writer: Arc<Mutex<Option<Box<dyn crate::io::MessageWriter>>>>,
    pub event_sender: broadcast::Sender<StatusEvent>,
    pub reader_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub reconnect_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub poll_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub attempts: Arc<AtomicU32>,
    pub running: Arc<AtomicBool>,
    pub stop_notify: Arc<Notify>,
    pub connector: Arc<dyn Connector>,
}

impl SharedConnectionState {
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            state: new_state_handle(),
            writer: Arc::new(Mutex::new(None)),
            event_sender,
            reader_handle: Arc::new(Mutex::new(None)),
            reconnect_handle: Arc::new(Mutex::new(None)),
            poll_handle: Arc::new(Mutex::new(None)),
            attempts: Arc::new(AtomicU32::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            stop_notify: Arc::new(Notify::new()),
            connector,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connection == ConnectionStatus::Connected
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.state.read().await.connection.clone()
    }

    pub async fn set_connection_status(&self, status: ConnectionStatus) {
        self.state.write().await.connection = status;
    }
}

/// Send the refresh command on the open channel, if any
pub(crate) async fn send_refresh(shared: &SharedConnectionState) {
    let mut writer_guard = shared.writer.lock().await;
    if let Some(writer) = writer_guard.as_mut() {
        if let Err(e) = writer.send_text(REFRESH_COMMAND).await {
            debug!("Failed to send refresh command: {}", e);
        }
    }
}

/// Handle one inbound push message
///
/// Malformed or unsuccessful payloads are logged and dropped; the held state
/// is never altered by bad input.
pub(crate) async fn handle_message(text: &str, shared: &SharedConnectionState) {
    let envelope: ApiResponse<SnapshotPayload> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Discarding unparseable push message: {}", e);
            return;
        }
    };

    if !envelope.is_success() {
        debug!(
            "Discarding unsuccessful push message: status={}",
            envelope.status
        );
        return;
    }
    let Some(payload) = envelope.data else { return };

    let update = {
        let mut state = shared.state.write().await;
        state.apply(payload)
    };

    if update.online_changed {
        let _ = shared.event_sender.send(StatusEvent::OnlineChanged);
    }
    if update.status_changed {
        let _ = shared.event_sender.send(StatusEvent::SnapshotUpdated);
    }
}

/// Spawn the connect task.
///
/// With `immediate` set the first attempt happens right away and does not
/// count against the retry budget; every later attempt waits out the backoff
/// delay first. The task ends once a connection is installed, the budget is
/// exhausted, or the client is stopped.
pub(crate) fn spawn_connect_task(
    settings: ConnectionSettings,
    shared: SharedConnectionState,
    immediate: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut immediate = immediate;

        loop {
            if !shared.running.load(Ordering::SeqCst) {
                debug!("Client stopped, abandoning connection attempts");
                return;
            }

            if !immediate {
                let attempt = shared.attempts.load(Ordering::SeqCst);
                if attempt >= settings.reconnect.max_attempts {
                    warn!(
                        "Reconnection failed: max attempts ({}) exceeded",
                        settings.reconnect.max_attempts
                    );
                    shared.set_connection_status(ConnectionStatus::GaveUp).await;
                    let _ = shared.event_sender.send(StatusEvent::GaveUp);
                    return;
                }

                let delay = settings.reconnect.delay_for(attempt);
                shared.attempts.store(attempt + 1, Ordering::SeqCst);

                info!(
                    "Reconnecting to push channel (attempt {}/{}) in {:?}",
                    attempt + 1,
                    settings.reconnect.max_attempts,
                    delay
                );
                shared
                    .set_connection_status(ConnectionStatus::Retrying {
                        attempt: attempt + 1,
                        next_delay_ms: delay.as_millis() as u64,
                    })
                    .await;
                let _ = shared.event_sender.send(StatusEvent::Reconnecting {
                    attempt: attempt + 1,
                    delay_ms: delay.as_millis() as u64,
                });

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.stop_notify.notified() => {
                        debug!("Reconnection cancelled");
                        return;
                    }
                }

                if !shared.running.load(Ordering::SeqCst) {
                    return;
                }
            }
            immediate = false;

            match shared
                .connector
                .connect(&settings.endpoint, settings.connection_timeout)
                .await
            {
                Ok(pair) => {
                    if !shared.running.load(Ordering::SeqCst) {
                        // stop() raced the connect; the fresh channel must not
                        // outlive the session
                        let ConnectionPair { mut writer, .. } = pair;
                        let _ = writer.shutdown().await;
                        return;
                    }
                    install_connection(pair, &settings, &shared).await;
                    return;
                }
                Err(e) => {
                    debug!("Connection attempt failed: {}", e);
                }
            }
        }
    })
}

/// Wire a freshly opened channel into the shared state: store the writer,
/// reset the retry budget, request an immediate snapshot, start the reader.
async fn install_connection(
    pair: ConnectionPair,
    settings: &ConnectionSettings,
    shared: &SharedConnectionState,
) {
    {
        let mut writer_guard = shared.writer.lock().await;
        *writer_guard = Some(pair.writer);
    }

    shared.attempts.store(0, Ordering::SeqCst);
    shared.set_connection_status(ConnectionStatus::Connected).await;

    info!("Push channel connected to {}", settings.endpoint);
    let _ = shared.event_sender.send(StatusEvent::Connected);

    send_refresh(shared).await;

    let reader_task = spawn_reader_task(pair.reader, settings.clone(), shared.clone());
    {
        let mut handle = shared.reader_handle.lock().await;
        *handle = Some(reader_task);
    }
}

/// Spawn the reader task draining the push channel in arrival order.
///
/// On channel loss the task tears the connection down and, while the client
/// is still running, hands over to a new connect task.
pub(crate) fn spawn_reader_task(
    mut reader: Box<dyn MessageReader>,
    settings: ConnectionSettings,
    shared: SharedConnectionState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let disconnect_reason;

        loop {
            match reader.next_message().await {
                Ok(None) => {
                    debug!("Push channel closed");
                    disconnect_reason = "Connection closed by remote".to_string();
                    break;
                }
                Ok(Some(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    handle_message(&text, &shared).await;
                }
                Err(e) => {
                    debug!("Error reading from push channel: {}", e);
                    disconnect_reason = format!("Read error: {}", e);
                    break;
                }
            }
        }

        warn!("Push channel lost: {}", disconnect_reason);

        // Close the writer
        {
            let mut writer_guard = shared.writer.lock().await;
            if let Some(mut writer) = writer_guard.take() {
                let _ = writer.shutdown().await;
            }
        }

        shared
            .set_connection_status(ConnectionStatus::Disconnected)
            .await;
        let _ = shared.event_sender.send(StatusEvent::Disconnected {
            reason: disconnect_reason,
        });

        // Start reconnection unless the client was stopped
        if shared.running.load(Ordering::SeqCst) {
            debug!("Starting reconnection task");
            let reconnect_task = spawn_connect_task(settings, shared.clone(), false);
            let mut handle = shared.reconnect_handle.lock().await;
            *handle = Some(reconnect_task);
        }
    })
}

/// Spawn the periodic refresh task: every poll interval, nudge the backend
/// for a fresh snapshot on the already-open channel.
pub(crate) fn spawn_poll_task(
    settings: ConnectionSettings,
    shared: SharedConnectionState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = settings.poll_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first tick fires immediately; the on-connect refresh covers it
        interval.tick().await;

        loop {
            interval.tick().await;
            if !shared.running.load(Ordering::SeqCst) {
                return;
            }
            if shared.is_connected().await {
                send_refresh(&shared).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MockConnector;

    fn shared_with_mock() -> SharedConnectionState {
        SharedConnectionState::with_connector(Arc::new(MockConnector::new()))
    }

    #[tokio::test]
    async fn initial_state_is_disconnected() {
        let shared = shared_with_mock();
        assert!(!shared.is_connected().await);
        assert_eq!(
            shared.connection_status().await,
            ConnectionStatus::Disconnected
        );
        assert_eq!(shared.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connection_status_round_trips() {
        let shared = shared_with_mock();
        shared.set_connection_status(ConnectionStatus::Connected).await;
        assert!(shared.is_connected().await);

        shared
            .set_connection_status(ConnectionStatus::Retrying {
                attempt: 3,
                next_delay_ms: 4000,
            })
            .await;
        assert!(!shared.is_connected().await);
        assert_eq!(
            shared.connection_status().await,
            ConnectionStatus::Retrying {
                attempt: 3,
                next_delay_ms: 4000
            }
        );
    }

    #[tokio::test]
    async fn malformed_message_leaves_state_untouched() {
        let shared = shared_with_mock();
        handle_message("not json", &shared).await;
        let state = shared.state.read().await;
        assert!(state.online.is_empty());
        assert!(state.status_by_node.is_empty());
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_dropped() {
        let shared = shared_with_mock();
        handle_message(
            r#"{"status":"error","data":{"online":["a"],"data":{}}}"#,
            &shared,
        )
        .await;
        assert!(shared.state.read().await.online.is_empty());
    }

    #[tokio::test]
    async fn successful_envelope_replaces_state_and_notifies() {
        let shared = shared_with_mock();
        let mut events = shared.event_sender.subscribe();

        handle_message(
            r#"{"status":"success","data":{"online":["a"],"data":{"a":{"cpu":{"usage":5.0}}}}}"#,
            &shared,
        )
        .await;

        assert!(shared.state.read().await.online.contains("a"));
        assert_eq!(events.try_recv().unwrap(), StatusEvent::OnlineChanged);
        assert_eq!(events.try_recv().unwrap(), StatusEvent::SnapshotUpdated);
    }

    #[tokio::test]
    async fn identical_payload_emits_no_events() {
        let shared = shared_with_mock();
        let message =
            r#"{"status":"success","data":{"online":["x"],"data":{"x":{"cpu":{"usage":1.0}}}}}"#;
        handle_message(message, &shared).await;

        let mut events = shared.event_sender.subscribe();
        handle_message(message, &shared).await;
        assert!(events.try_recv().is_err());
    }
}
