use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use status_sync::io::ReqwestHttpClient;
use status_sync::{
    group_labels, load_config, project, Config, DashboardStats, LiveStatusClient, Preferences,
    RosterClient, StatusEvent,
};
use tracing::{debug, info, warn, Level};

#[derive(Parser)]
#[command(name = "status-sync")]
#[command(about = "Live node status client for Statuswatch")]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8080
    #[arg(long)]
    base_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = clap::value_parser!(Level))]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the roster and print the filtered, ordered node list
    Nodes {
        /// Substring to match against node name, ip, or hostname
        #[arg(long)]
        search: Option<String>,

        /// Only show nodes of this group ("all" clears the filter)
        #[arg(long)]
        group: Option<String>,

        /// Online status filter: all, online, or offline
        #[arg(long)]
        online: Option<String>,
    },

    /// Attach to the push channel and log live updates
    Monitor,

    /// Print the recent metric series for one node
    Recent {
        /// Node uuid
        uuid: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        Config::default()
    };
    if let Some(base_url) = args.base_url {
        config.server.base_url = base_url;
    }

    match args.command {
        Commands::Nodes {
            search,
            group,
            online,
        } => {
            run_nodes(&config, search, group, online).await?;
        }
        Commands::Monitor => {
            run_monitor(&config).await?;
        }
        Commands::Recent { uuid } => {
            run_recent(&config, &uuid).await?;
        }
    }

    Ok(())
}

/// Wait until the client has received its first snapshot, or the connection
/// gave up, or the timeout elapsed
async fn wait_for_snapshot(
    events: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
    timeout: Duration,
) {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(StatusEvent::SnapshotUpdated) | Ok(StatusEvent::OnlineChanged) => break,
                Ok(StatusEvent::GaveUp) => {
                    warn!("Push channel gave up before delivering a snapshot");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Event receiver error: {}", e);
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(timeout, wait).await.is_err() {
        warn!("No snapshot received within {:?}", timeout);
    }
}

async fn run_nodes(
    config: &Config,
    search: Option<String>,
    group: Option<String>,
    online: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let http = Arc::new(ReqwestHttpClient::new());
    let roster = RosterClient::new(config.server.clone(), http);
    let nodes = roster.fetch_nodes().await?;
    info!(
        "Fetched {} nodes in groups [{}]",
        nodes.len(),
        group_labels(&nodes).join(", ")
    );

    // CLI flags override the persisted preferences, and stick like the
    // dashboard controls do
    let mut prefs = Preferences::load(&config.preferences_path);
    if let Some(group) = group {
        prefs.selected_group = if group == "all" || group.is_empty() {
            None
        } else {
            Some(group)
        };
    }
    if let Some(online) = online {
        prefs.online_filter = online.parse()?;
    }
    if let Err(e) = prefs.store(&config.preferences_path) {
        debug!("Could not persist preferences: {}", e);
    }

    let mut filter = prefs.filter_state();
    if let Some(search) = search {
        filter.search = search;
    }

    let client = LiveStatusClient::new(config.clone());
    let mut events = client.subscribe();
    client.start().await?;
    wait_for_snapshot(&mut events, Duration::from_secs(5)).await;

    let online_set = client.online_ids().await;
    let status = client.status_snapshots().await;
    client.stop().await;

    for node in project(&nodes, &online_set, &filter) {
        let state = if online_set.contains(&node.uuid) {
            "online"
        } else {
            "offline"
        };
        match status.get(&node.uuid) {
            Some(snapshot) => info!(
                "[{}] {} ({}) {} - cpu {:.1}% ram {:.0}% disk {:.0}%",
                state,
                node.name,
                node.ip,
                node.group.as_deref().unwrap_or("-"),
                snapshot.cpu.usage,
                snapshot.ram.percent(),
                snapshot.disk.percent(),
            ),
            None => info!(
                "[{}] {} ({}) {} - no data",
                state,
                node.name,
                node.ip,
                node.group.as_deref().unwrap_or("-"),
            ),
        }
    }

    print_stats(&DashboardStats::compute(&nodes, &online_set, &status));
    Ok(())
}

async fn run_monitor(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let http = Arc::new(ReqwestHttpClient::new());
    let roster = RosterClient::new(config.server.clone(), http);
    let nodes = match roster.fetch_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!("Roster fetch failed, aggregates will cover zero nodes: {}", e);
            Vec::new()
        }
    };

    let client = LiveStatusClient::new(config.clone());
    let mut events = client.subscribe();
    client.start().await?;

    info!("Monitoring live status (press Ctrl+C to stop)...");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(StatusEvent::Connected) => info!("Push channel connected"),
                    Ok(StatusEvent::SnapshotUpdated) | Ok(StatusEvent::OnlineChanged) => {
                        let online_set = client.online_ids().await;
                        let status = client.status_snapshots().await;
                        print_stats(&DashboardStats::compute(&nodes, &online_set, &status));
                    }
                    Ok(StatusEvent::Disconnected { reason }) => {
                        warn!("Push channel lost: {}", reason);
                    }
                    Ok(StatusEvent::Reconnecting { attempt, delay_ms }) => {
                        info!("Reconnecting (attempt {}) in {} ms", attempt, delay_ms);
                    }
                    Ok(StatusEvent::GaveUp) => {
                        warn!("Gave up reconnecting; restart to resume");
                    }
                    Err(e) => {
                        debug!("Event receiver error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    client.stop().await;
    Ok(())
}

async fn run_recent(config: &Config, uuid: &str) -> Result<(), Box<dyn std::error::Error>> {
    let http = Arc::new(ReqwestHttpClient::new());
    let roster = RosterClient::new(config.server.clone(), http);

    let series = roster.recent_metrics(uuid).await?;
    info!("{} recent samples for {}", series.len(), uuid);
    for snapshot in &series {
        info!(
            "cpu {:.1}% ram {:.0}% disk {:.0}% load {:.2} net {}/{} B/s",
            snapshot.cpu.usage,
            snapshot.ram.percent(),
            snapshot.disk.percent(),
            snapshot.load.load1,
            snapshot.network.up,
            snapshot.network.down,
        );
    }
    Ok(())
}

fn print_stats(stats: &DashboardStats) {
    info!(
        "{} nodes: {} online, {} offline, {} groups | avg cpu {}% ram {}% disk {}% | {} processes",
        stats.total_nodes,
        stats.online_count,
        stats.offline_count,
        stats.distinct_groups,
        stats.avg_cpu_usage,
        stats.avg_memory_usage,
        stats.avg_disk_usage,
        stats.total_processes,
    );
}
