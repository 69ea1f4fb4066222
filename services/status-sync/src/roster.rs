//! REST client for the node roster and recent-metrics endpoints

use std::sync::Arc;

use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{Result, SyncError};
use crate::io::HttpClient;
use crate::types::{ApiResponse, Node, StatusSnapshot};

/// Client for the one-shot roster fetch and the per-node history slice
pub struct RosterClient {
    server: ServerConfig,
    http: Arc<dyn HttpClient>,
}

impl RosterClient {
    pub fn new(server: ServerConfig, http: Arc<dyn HttpClient>) -> Self {
        Self { server, http }
    }

    /// Fetch the full node roster from `/api/nodes`
    ///
    /// Errors leave the caller's previously fetched roster untouched; there
    /// is no partial result.
    pub async fn fetch_nodes(&self) -> Result<Vec<Node>> {
        let url = self.server.nodes_endpoint();
        let response = self.http.get(&url).await?;
        if response.status != 200 {
            return Err(SyncError::Http(format!(
                "GET {} returned status {}",
                url, response.status
            )));
        }

        let envelope: ApiResponse<Vec<Node>> = serde_json::from_str(&response.body)?;
        if !envelope.is_success() {
            return Err(SyncError::Api(
                envelope
                    .message
                    .unwrap_or_else(|| format!("status {}", envelope.status)),
            ));
        }
        let nodes = envelope.data.unwrap_or_default();
        debug!("Fetched {} nodes from {}", nodes.len(), url);
        Ok(nodes)
    }

    /// Fetch the recent-window metric series for one node from
    /// `/api/recent/{uuid}`
    pub async fn recent_metrics(&self, uuid: &str) -> Result<Vec<StatusSnapshot>> {
        let url = self.server.recent_endpoint(uuid);
        let response = self.http.get(&url).await?;
        if response.status != 200 {
            return Err(SyncError::Http(format!(
                "GET {} returned status {}",
                url, response.status
            )));
        }

        let envelope: ApiResponse<Vec<StatusSnapshot>> = serde_json::from_str(&response.body)?;
        if !envelope.is_success() {
            return Err(SyncError::Api(
                envelope
                    .message
                    .unwrap_or_else(|| format!("status {}", envelope.status)),
            ));
        }
        Ok(envelope.data.unwrap_or_default())
    }
}

/// Sorted, deduplicated non-empty group labels across the roster
pub fn group_labels(nodes: &[Node]) -> Vec<String> {
    let mut labels: Vec<String> = nodes
        .iter()
        .filter_map(|node| node.group.clone())
        .filter(|group| !group.is_empty())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}
