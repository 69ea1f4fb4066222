//! Live status client: one logical push connection to the backend

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::connection::{
    spawn_connect_task, spawn_poll_task, ConnectionSettings, SharedConnectionState,
};
use crate::error::Result;
use crate::events::StatusEvent;
use crate::io::{Connector, WsConnector};
use crate::state::{ConnectionStatus, StateHandle};
use crate::types::StatusSnapshot;

/// Client owning the push connection and the latest live state
///
/// Maintains `{status_by_node, online, connection}` behind a shared handle,
/// refreshed by the channel in arrival order, and reconnects with capped
/// exponential backoff when the channel drops. All connection work happens in
/// background tasks; no method blocks on the network.
pub struct LiveStatusClient {
    config: Config,
    shared: SharedConnectionState,
}

impl LiveStatusClient {
    /// Create a new client with the given configuration
    ///
    /// Uses the WebSocket connector for production use.
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(WsConnector::new()))
    }

    /// Create a new client with a custom connector
    ///
    /// This is useful for testing with mock connections.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            shared: SharedConnectionState::with_connector(connector),
        }
    }

    fn settings(&self, endpoint: String) -> ConnectionSettings {
        ConnectionSettings {
            endpoint,
            connection_timeout: self.config.server.connection_timeout(),
            poll_interval: self.config.server.poll_interval(),
            reconnect: self.config.reconnect.clone(),
        }
    }

    /// Start the client: open the push channel and the periodic refresh
    /// timer.
    ///
    /// Returns once the background tasks are launched; the connection itself
    /// is established asynchronously and reported through `subscribe`.
    /// Transport failures never fail this call — they feed the backoff loop —
    /// so the only errors here are configuration errors. Calling `start` on a
    /// running client tears the previous session down first.
    pub async fn start(&self) -> Result<()> {
        let endpoint = self.config.server.push_endpoint()?;

        // Tear down any previous session before opening a new one
        self.stop().await;

        debug!("Starting live status client against {}", endpoint);
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.attempts.store(0, Ordering::SeqCst);

        let settings = self.settings(endpoint);

        let poll_task = spawn_poll_task(settings.clone(), self.shared.clone());
        {
            let mut handle = self.shared.poll_handle.lock().await;
            *handle = Some(poll_task);
        }

        let connect_task = spawn_connect_task(settings, self.shared.clone(), true);
        {
            let mut handle = self.shared.reconnect_handle.lock().await;
            *handle = Some(connect_task);
        }

        Ok(())
    }

    /// Stop the client: cancel the refresh timer and any pending reconnect,
    /// abort the reader, close the channel.
    ///
    /// Idempotent and safe to call from any state; held live data stays
    /// available as last known good state.
    pub async fn stop(&self) {
        debug!("Stopping live status client");

        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.stop_notify.notify_waiters();

        {
            let mut handle = self.shared.poll_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }
        {
            let mut handle = self.shared.reconnect_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }
        {
            let mut handle = self.shared.reader_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }

        // Close the writer
        {
            let mut writer = self.shared.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.shutdown().await;
            }
        }

        self.shared
            .set_connection_status(ConnectionStatus::Disconnected)
            .await;
    }

    /// Check whether the push channel is currently open
    pub async fn is_connected(&self) -> bool {
        self.shared.is_connected().await
    }

    /// Current connection lifecycle state
    pub async fn connection_status(&self) -> ConnectionStatus {
        self.shared.connection_status().await
    }

    /// Latest per-node snapshot map
    pub async fn status_snapshots(&self) -> HashMap<String, StatusSnapshot> {
        self.shared.state.read().await.status_by_node.clone()
    }

    /// Authoritative set of currently reachable node ids
    pub async fn online_ids(&self) -> HashSet<String> {
        self.shared.state.read().await.online.clone()
    }

    /// Shared handle to the live state, for consumers that want to read
    /// without cloning
    pub fn state_handle(&self) -> StateHandle {
        Arc::clone(&self.shared.state)
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.shared.event_sender.subscribe()
    }
}
