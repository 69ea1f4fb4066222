//! Events broadcast by the live status client

/// Notification delivered to `LiveStatusClient::subscribe` receivers
///
/// Update events are only emitted when the held state actually changed by
/// value; identical payloads stay silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Push channel opened (or reopened) and the initial refresh was sent
    Connected,

    /// The per-node snapshot map was replaced with differing data
    SnapshotUpdated,

    /// The authoritative online set changed
    OnlineChanged,

    /// Push channel lost; a reconnect attempt may follow
    Disconnected { reason: String },

    /// Waiting to reconnect; `attempt` is one-based
    Reconnecting { attempt: u32, delay_ms: u64 },

    /// Retry budget exhausted; the client stays down until restarted
    GaveUp,
}
