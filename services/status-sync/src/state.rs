//! Shared live state: snapshot map, online set, connection status

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{SnapshotPayload, StatusSnapshot};

/// Connection lifecycle as observed by consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and none pending (initial state, or after `stop`)
    Disconnected,
    Connected,
    /// Waiting to reconnect; `attempt` is one-based
    Retrying { attempt: u32, next_delay_ms: u64 },
    /// Retry budget exhausted; only a fresh start reconnects
    GaveUp,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected
    }
}

/// State shared between the client facade, the connection tasks, and readers
///
/// Mutated only by the message handler and the connection lifecycle, and only
/// via full replacement of the affected part.
#[derive(Debug, Default)]
pub struct LiveState {
    pub status_by_node: HashMap<String, StatusSnapshot>,
    pub online: HashSet<String>,
    pub connection: ConnectionStatus,
}

/// Which parts of the held state a payload actually changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub online_changed: bool,
    pub status_changed: bool,
}

impl LiveState {
    /// Apply a push payload, replacing the online set and snapshot map only
    /// where they differ by value from the held state.
    ///
    /// Returns which parts changed so callers can skip redundant
    /// notifications.
    pub fn apply(&mut self, payload: SnapshotPayload) -> AppliedUpdate {
        let incoming_online: HashSet<String> = payload.online.into_iter().collect();
        let online_changed = self.online != incoming_online;
        if online_changed {
            self.online = incoming_online;
        }

        let status_changed = self.status_by_node != payload.data;
        if status_changed {
            self.status_by_node = payload.data;
        }

        AppliedUpdate {
            online_changed,
            status_changed,
        }
    }

    /// Drop all held live data, keeping the connection status
    pub fn clear(&mut self) {
        self.status_by_node.clear();
        self.online.clear();
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<LiveState>>;

pub fn new_state_handle() -> StateHandle {
    Arc::new(RwLock::new(LiveState::default()))
}
