//! Status synchronization core for the Statuswatch dashboard
//!
//! This crate keeps a local mirror of a monitoring backend's live state: a
//! reconnecting push-channel client ([`LiveStatusClient`]) maintains the
//! latest per-node status snapshots and the authoritative online set, and a
//! pure projection layer ([`projector`]) derives the filtered, ordered node
//! view plus dashboard aggregates from it.

pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod events;
pub mod io;
pub mod prefs;
pub mod projector;
pub mod roster;
pub mod state;
pub mod types;

pub use client::LiveStatusClient;
pub use config::{load_config, Config, ReconnectConfig, ServerConfig};
pub use error::{Result, SyncError};
pub use events::StatusEvent;
pub use prefs::{Preferences, ViewMode};
pub use projector::{project, DashboardStats, FilterState, OnlineFilter};
pub use roster::{group_labels, RosterClient};
pub use state::{ConnectionStatus, LiveState, StateHandle};
pub use types::{ApiResponse, Node, SnapshotPayload, StatusSnapshot};
