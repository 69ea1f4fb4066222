//! Mock monitoring backend for manual testing
//!
//! Serves a canned node roster over REST and canned status snapshots over
//! the push channel, speaking the same wire format as a real backend:
//!
//!   GET /api/nodes          -> `{status, data: Node[]}`
//!   GET /api/recent/{uuid}  -> `{status, data: StatusSnapshot[]}`
//!   GET /api/clients        -> WebSocket; replies to the "get" command
//!
//! Usage:
//!   mock_backend [--port PORT]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde_json::json;
use status_sync::{Node, StatusSnapshot};
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "mock_backend")]
#[command(about = "Mock Statuswatch backend with canned data")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = clap::value_parser!(Level))]
    log_level: Level,
}

/// Shared mock data; the tick counter wiggles the metrics so consecutive
/// "get" replies differ
#[derive(Clone)]
struct MockState {
    nodes: Arc<Vec<Node>>,
    tick: Arc<AtomicU64>,
}

impl MockState {
    fn new() -> Self {
        Self {
            nodes: Arc::new(canned_nodes()),
            tick: Arc::new(AtomicU64::new(0)),
        }
    }

    fn snapshot_for(&self, index: u64, tick: u64) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::default();
        snapshot.cpu.usage = ((index * 17 + tick * 7) % 100) as f64;
        snapshot.cpu.temp = Some(40.0 + (tick % 20) as f64);
        snapshot.ram.used = 1024 * (1 + (index + tick) % 7);
        snapshot.ram.total = 8192;
        snapshot.swap.total = 2048;
        snapshot.disk.used = 200 * (1 + index);
        snapshot.disk.total = 4096;
        snapshot.network.up = 1000 * (1 + tick % 5);
        snapshot.network.down = 3000 * (1 + tick % 3);
        snapshot.network.total_up = 1_000_000 + tick * 1000;
        snapshot.network.total_down = 5_000_000 + tick * 3000;
        snapshot.load.load1 = 0.2 + (tick % 10) as f64 / 10.0;
        snapshot.load.load5 = 0.4;
        snapshot.load.load15 = 0.3;
        snapshot.uptime = 86_400 + tick * 3;
        snapshot.process = 100 + (index * 11 + tick) % 50;
        snapshot.connections.tcp = 10 + index;
        snapshot
    }

    /// Push-channel envelope: every node but the last reports in
    fn snapshot_envelope(&self) -> String {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        let online: Vec<&str> = self
            .nodes
            .iter()
            .take(self.nodes.len().saturating_sub(1))
            .map(|n| n.uuid.as_str())
            .collect();
        let data: serde_json::Map<String, serde_json::Value> = self
            .nodes
            .iter()
            .enumerate()
            .take(online.len())
            .map(|(i, node)| {
                (
                    node.uuid.clone(),
                    serde_json::to_value(self.snapshot_for(i as u64, tick)).unwrap_or_default(),
                )
            })
            .collect();

        json!({
            "status": "success",
            "data": {
                "online": online,
                "data": data,
            }
        })
        .to_string()
    }
}

fn canned_nodes() -> Vec<Node> {
    let specs = [
        ("a2b4c6d8", "frankfurt-1", "fra-01", "10.1.0.11", "eu", 1),
        ("e1f3a5b7", "frankfurt-2", "fra-02", "10.1.0.12", "eu", 2),
        ("c9d1e3f5", "tokyo-1", "tyo-01", "10.2.0.21", "asia", 1),
        ("b8a6c4e2", "virginia-1", "iad-01", "10.3.0.31", "us", 3),
    ];
    specs
        .iter()
        .map(|(uuid, name, hostname, ip, group, weight)| Node {
            uuid: uuid.to_string(),
            name: name.to_string(),
            hostname: Some(hostname.to_string()),
            ip: ip.to_string(),
            os: "Debian 12".to_string(),
            arch: "x86_64".to_string(),
            region: group.to_string(),
            cpu_name: "AMD EPYC 7543".to_string(),
            gpu_name: None,
            cpu_cores: 8,
            cpu_threads: Some(16),
            mem_total: 8192,
            disk_total: 4096,
            virtualization: Some("kvm".to_string()),
            group: Some(group.to_string()),
            weight: *weight,
        })
        .collect()
}

async fn nodes_handler(State(state): State<MockState>) -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "data": state.nodes.as_ref(),
    }))
}

async fn recent_handler(
    Path(uuid): Path<String>,
    State(state): State<MockState>,
) -> impl IntoResponse {
    let Some(index) = state.nodes.iter().position(|n| n.uuid == uuid) else {
        return Json(json!({
            "status": "error",
            "message": format!("unknown node {}", uuid),
        }));
    };

    let tick = state.tick.load(Ordering::SeqCst);
    let series: Vec<StatusSnapshot> = (0u64..30)
        .map(|offset| state.snapshot_for(index as u64, tick.saturating_sub(30 - offset)))
        .collect();
    Json(json!({
        "status": "success",
        "data": series,
    }))
}

async fn clients_handler(
    ws: WebSocketUpgrade,
    State(state): State<MockState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_push_channel(socket, state))
}

async fn handle_push_channel(mut socket: WebSocket, state: MockState) {
    info!("Push channel client connected");
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if text.as_str() == "get" {
                let envelope = state.snapshot_envelope();
                if socket.send(Message::Text(envelope.into())).await.is_err() {
                    break;
                }
            } else {
                debug!("Ignoring unknown command: {}", text);
            }
        }
    }
    info!("Push channel client disconnected");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let state = MockState::new();
    let router = Router::new()
        .route("/api/nodes", get(nodes_handler))
        .route("/api/recent/{uuid}", get(recent_handler))
        .route("/api/clients", get(clients_handler))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("Mock backend listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
