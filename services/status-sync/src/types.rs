//! Wire format shared by the REST API and the push channel

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Response envelope used by every backend endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// An envelope is successful when the status says so and it carries data
    pub fn is_success(&self) -> bool {
        self.status == "success" && self.data.is_some()
    }
}

/// Static descriptor of a monitored node
///
/// Fetched once from `/api/nodes` and immutable for the session; only a
/// refetch replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub ip: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub cpu_name: String,
    #[serde(default)]
    pub gpu_name: Option<String>,
    #[serde(default)]
    pub cpu_cores: u32,
    #[serde(default)]
    pub cpu_threads: Option<u32>,
    #[serde(default)]
    pub mem_total: u64,
    #[serde(default)]
    pub disk_total: u64,
    #[serde(default)]
    pub virtualization: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Primary sort key, ascending
    #[serde(default)]
    pub weight: i64,
}

/// CPU usage and optional package temperature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStatus {
    #[serde(default)]
    pub usage: f64,
    #[serde(default)]
    pub temp: Option<f64>,
}

/// Used/total byte pair for RAM, swap, and disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsagePair {
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub total: u64,
}

impl UsagePair {
    /// Usage percentage; a zero total counts as a denominator of one
    pub fn percent(&self) -> f64 {
        let total = if self.total == 0 { 1 } else { self.total };
        self.used as f64 / total as f64 * 100.0
    }
}

/// Instantaneous rates and cumulative totals for the network interfaces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
    #[serde(default)]
    pub total_up: u64,
    #[serde(default)]
    pub total_down: u64,
}

/// 1/5/15 minute load averages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStatus {
    #[serde(default)]
    pub load1: f64,
    #[serde(default)]
    pub load5: f64,
    #[serde(default)]
    pub load15: f64,
}

/// Open connection counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCounts {
    #[serde(default)]
    pub tcp: u64,
    #[serde(default)]
    pub udp: Option<u64>,
}

/// Latest live metrics for one node
///
/// Superseded wholesale on every push update; never merged field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub cpu: CpuStatus,
    #[serde(default)]
    pub ram: UsagePair,
    #[serde(default)]
    pub swap: UsagePair,
    #[serde(default)]
    pub disk: UsagePair,
    #[serde(default)]
    pub network: NetworkStatus,
    #[serde(default)]
    pub load: LoadStatus,
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub process: u64,
    #[serde(default)]
    pub connections: ConnectionCounts,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Payload of a push-channel message: the authoritative online set plus the
/// per-node snapshot map
///
/// Snapshot presence does not imply online membership; `online` alone decides
/// which nodes are reachable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotPayload {
    #[serde(default)]
    pub online: Vec<String>,
    #[serde(default)]
    pub data: HashMap<String, StatusSnapshot>,
}
