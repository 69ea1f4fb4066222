//! Pure projection of the node list: filtering, ordering, aggregates
//!
//! Everything in this module is a deterministic function of its inputs; the
//! live state is read, never touched.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::{Node, StatusSnapshot};

/// Online-status filter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineFilter {
    All,
    Online,
    Offline,
}

impl Default for OnlineFilter {
    fn default() -> Self {
        OnlineFilter::All
    }
}

impl fmt::Display for OnlineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnlineFilter::All => write!(f, "all"),
            OnlineFilter::Online => write!(f, "online"),
            OnlineFilter::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for OnlineFilter {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(OnlineFilter::All),
            "online" => Ok(OnlineFilter::Online),
            "offline" => Ok(OnlineFilter::Offline),
            _ => Err(SyncError::Config(format!("Unknown online filter: {}", s))),
        }
    }
}

/// User-selected filters over the node list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Case-insensitive substring match against name, ip, or hostname;
    /// empty or whitespace-only matches everything
    pub search: String,
    /// `None` means "all groups"
    pub group: Option<String>,
    pub online: OnlineFilter,
}

impl FilterState {
    /// Whether a node passes all three predicates: search, group, online
    pub fn matches(&self, node: &Node, online: &HashSet<String>) -> bool {
        let query = self.search.trim().to_lowercase();
        if !query.is_empty() {
            let name_hit = node.name.to_lowercase().contains(&query);
            let ip_hit = node.ip.to_lowercase().contains(&query);
            let hostname_hit = node
                .hostname
                .as_deref()
                .is_some_and(|h| h.to_lowercase().contains(&query));
            if !name_hit && !ip_hit && !hostname_hit {
                return false;
            }
        }

        if let Some(group) = &self.group {
            // a node without a group never matches a specific group
            if node.group.as_deref() != Some(group.as_str()) {
                return false;
            }
        }

        let is_online = online.contains(&node.uuid);
        match self.online {
            OnlineFilter::All => true,
            OnlineFilter::Online => is_online,
            OnlineFilter::Offline => !is_online,
        }
    }
}

/// Filter and order the node list for display.
///
/// Order is ascending by weight, ties broken by name.
pub fn project<'a>(
    nodes: &'a [Node],
    online: &HashSet<String>,
    filter: &FilterState,
) -> Vec<&'a Node> {
    let mut selected: Vec<&Node> = nodes
        .iter()
        .filter(|node| filter.matches(node, online))
        .collect();
    selected.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.name.cmp(&b.name)));
    selected
}

/// Aggregate statistics shown above the node list
///
/// Usage averages and the process total are computed over the unfiltered
/// online subset; a node without a snapshot still counts as online and
/// contributes zero usage. Distinct groups count non-empty labels across all
/// nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_nodes: usize,
    pub online_count: usize,
    pub offline_count: usize,
    pub avg_cpu_usage: u32,
    pub avg_memory_usage: u32,
    pub avg_disk_usage: u32,
    pub total_processes: u64,
    pub distinct_groups: usize,
}

impl DashboardStats {
    pub fn compute(
        nodes: &[Node],
        online: &HashSet<String>,
        status_by_node: &HashMap<String, StatusSnapshot>,
    ) -> Self {
        let total_nodes = nodes.len();
        let online_nodes: Vec<&Node> = nodes
            .iter()
            .filter(|node| online.contains(&node.uuid))
            .collect();
        let online_count = online_nodes.len();
        let offline_count = total_nodes - online_count;

        let mut cpu_sum = 0.0;
        let mut memory_sum = 0.0;
        let mut disk_sum = 0.0;
        let mut total_processes = 0u64;
        for node in &online_nodes {
            if let Some(status) = status_by_node.get(&node.uuid) {
                cpu_sum += status.cpu.usage;
                memory_sum += status.ram.percent();
                disk_sum += status.disk.percent();
                total_processes += status.process;
            }
        }

        let average = |sum: f64| -> u32 {
            if online_count == 0 {
                0
            } else {
                (sum / online_count as f64).round() as u32
            }
        };

        let distinct_groups = nodes
            .iter()
            .filter_map(|node| node.group.as_deref())
            .filter(|group| !group.is_empty())
            .collect::<HashSet<_>>()
            .len();

        Self {
            total_nodes,
            online_count,
            offline_count,
            avg_cpu_usage: average(cpu_sum),
            avg_memory_usage: average(memory_sum),
            avg_disk_usage: average(disk_sum),
            total_processes,
            distinct_groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(uuid: &str, name: &str, weight: i64) -> Node {
        Node {
            uuid: uuid.to_string(),
            name: name.to_string(),
            hostname: None,
            ip: format!("10.0.0.{}", uuid.len()),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            region: "us".to_string(),
            cpu_name: "cpu".to_string(),
            gpu_name: None,
            cpu_cores: 4,
            cpu_threads: None,
            mem_total: 0,
            disk_total: 0,
            virtualization: None,
            group: None,
            weight,
        }
    }

    fn with_group(mut node: Node, group: &str) -> Node {
        node.group = Some(group.to_string());
        node
    }

    fn online(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn snapshot(cpu: f64, ram: (u64, u64), disk: (u64, u64), processes: u64) -> StatusSnapshot {
        let mut status = StatusSnapshot::default();
        status.cpu.usage = cpu;
        status.ram.used = ram.0;
        status.ram.total = ram.1;
        status.disk.used = disk.0;
        status.disk.total = disk.1;
        status.process = processes;
        status
    }

    #[test]
    fn sorts_by_weight_then_name() {
        let nodes = vec![node("A", "b", 2), node("B", "z", 1), node("C", "a", 1)];
        let ordered = project(&nodes, &online(&["A", "B"]), &FilterState::default());
        let names: Vec<&str> = ordered.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z", "b"]);
        let uuids: Vec<&str> = ordered.iter().map(|n| n.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["C", "B", "A"]);
    }

    #[test]
    fn ordering_invariant_holds() {
        let nodes = vec![
            node("1", "delta", 3),
            node("2", "alpha", 1),
            node("3", "charlie", 1),
            node("4", "bravo", 3),
            node("5", "echo", 2),
        ];
        let ordered = project(&nodes, &online(&[]), &FilterState::default());
        for pair in ordered.windows(2) {
            assert!(pair[0].weight <= pair[1].weight);
            if pair[0].weight == pair[1].weight {
                assert!(pair[0].name <= pair[1].name);
            }
        }
    }

    #[test]
    fn search_matches_name_ip_or_hostname() {
        let mut by_hostname = node("H", "plain", 0);
        by_hostname.hostname = Some("edge-fra-01".to_string());
        let nodes = vec![node("N", "Tokyo Box", 0), by_hostname];

        let by_name = FilterState {
            search: "tokyo".to_string(),
            ..Default::default()
        };
        assert_eq!(project(&nodes, &online(&[]), &by_name).len(), 1);

        let by_host = FilterState {
            search: "FRA".to_string(),
            ..Default::default()
        };
        let hits = project(&nodes, &online(&[]), &by_host);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "H");

        let by_ip = FilterState {
            search: "10.0.0.".to_string(),
            ..Default::default()
        };
        assert_eq!(project(&nodes, &online(&[]), &by_ip).len(), 2);
    }

    #[test]
    fn whitespace_search_matches_everything() {
        let nodes = vec![node("A", "a", 0), node("B", "b", 0)];
        let filter = FilterState {
            search: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(project(&nodes, &online(&[]), &filter).len(), 2);
    }

    #[test]
    fn group_filter_is_exact_and_skips_ungrouped() {
        let nodes = vec![
            with_group(node("A", "a", 0), "eu"),
            with_group(node("B", "b", 0), "eu-west"),
            node("C", "c", 0),
        ];
        let filter = FilterState {
            group: Some("eu".to_string()),
            ..Default::default()
        };
        let hits = project(&nodes, &online(&[]), &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "A");

        // "all" passes ungrouped nodes through
        let all = project(&nodes, &online(&[]), &FilterState::default());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn online_filter_uses_membership_only() {
        // a stale snapshot for an offline node must not make it online
        let nodes = vec![node("A", "a", 0), node("B", "b", 0)];
        let online_set = online(&["A"]);

        let only_online = FilterState {
            online: OnlineFilter::Online,
            ..Default::default()
        };
        let hits = project(&nodes, &online_set, &only_online);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "A");

        let only_offline = FilterState {
            online: OnlineFilter::Offline,
            ..Default::default()
        };
        let hits = project(&nodes, &online_set, &only_offline);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "B");
    }

    #[test]
    fn filters_are_conjunctive() {
        let nodes = vec![
            with_group(node("A", "match", 0), "eu"),
            with_group(node("B", "match", 0), "us"),
            with_group(node("C", "other", 0), "eu"),
        ];
        let filter = FilterState {
            search: "match".to_string(),
            group: Some("eu".to_string()),
            online: OnlineFilter::Online,
        };
        let hits = project(&nodes, &online(&["A", "B", "C"]), &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "A");
    }

    #[test]
    fn projection_is_idempotent() {
        let nodes = vec![node("A", "b", 2), node("B", "z", 1), node("C", "a", 1)];
        let filter = FilterState {
            online: OnlineFilter::Online,
            ..Default::default()
        };
        let online_set = online(&["A", "C"]);
        let first: Vec<String> = project(&nodes, &online_set, &filter)
            .iter()
            .map(|n| n.uuid.clone())
            .collect();
        let second: Vec<String> = project(&nodes, &online_set, &filter)
            .iter()
            .map(|n| n.uuid.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn stats_count_online_and_offline_nodes() {
        let nodes = vec![node("A", "b", 2), node("B", "z", 1), node("C", "a", 1)];
        let stats = DashboardStats::compute(&nodes, &online(&["A", "B"]), &HashMap::new());
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.online_count, 2);
        assert_eq!(stats.offline_count, 1);
    }

    #[test]
    fn stats_average_over_online_subset_only() {
        let nodes = vec![node("A", "a", 0), node("B", "b", 0), node("C", "c", 0)];
        let mut status = HashMap::new();
        status.insert("A".to_string(), snapshot(50.0, (50, 100), (25, 100), 10));
        status.insert("B".to_string(), snapshot(30.0, (10, 100), (75, 100), 20));
        // offline node with a stale snapshot must not contribute
        status.insert("C".to_string(), snapshot(100.0, (100, 100), (100, 100), 99));

        let stats = DashboardStats::compute(&nodes, &online(&["A", "B"]), &status);
        assert_eq!(stats.avg_cpu_usage, 40);
        assert_eq!(stats.avg_memory_usage, 30);
        assert_eq!(stats.avg_disk_usage, 50);
        assert_eq!(stats.total_processes, 30);
    }

    #[test]
    fn online_node_without_snapshot_counts_but_contributes_zero() {
        let nodes = vec![node("A", "a", 0), node("B", "b", 0)];
        let mut status = HashMap::new();
        status.insert("A".to_string(), snapshot(80.0, (80, 100), (40, 100), 5));

        let stats = DashboardStats::compute(&nodes, &online(&["A", "B"]), &status);
        assert_eq!(stats.online_count, 2);
        // 80 / 2 online nodes
        assert_eq!(stats.avg_cpu_usage, 40);
        assert_eq!(stats.avg_memory_usage, 40);
        assert_eq!(stats.total_processes, 5);
    }

    #[test]
    fn zero_total_counts_as_denominator_one() {
        let nodes = vec![node("A", "a", 0)];
        let mut status = HashMap::new();
        status.insert("A".to_string(), snapshot(0.0, (3, 0), (0, 0), 0));

        let stats = DashboardStats::compute(&nodes, &online(&["A"]), &status);
        assert_eq!(stats.avg_memory_usage, 300);
        assert_eq!(stats.avg_disk_usage, 0);
    }

    #[test]
    fn empty_inputs_give_zero_stats() {
        let stats = DashboardStats::compute(&[], &HashSet::new(), &HashMap::new());
        assert_eq!(stats, DashboardStats::default());
        assert!(project(&[], &HashSet::new(), &FilterState::default()).is_empty());
    }

    #[test]
    fn distinct_groups_count_all_nodes_and_skip_empty() {
        let mut empty_group = node("D", "d", 0);
        empty_group.group = Some(String::new());
        let nodes = vec![
            with_group(node("A", "a", 0), "eu"),
            with_group(node("B", "b", 0), "eu"),
            with_group(node("C", "c", 0), "us"),
            empty_group,
            node("E", "e", 0),
        ];
        // no node online: group tally still covers every node
        let stats = DashboardStats::compute(&nodes, &HashSet::new(), &HashMap::new());
        assert_eq!(stats.distinct_groups, 2);
    }

    #[test]
    fn online_filter_parses_known_values() {
        assert_eq!("all".parse::<OnlineFilter>().unwrap(), OnlineFilter::All);
        assert_eq!("online".parse::<OnlineFilter>().unwrap(), OnlineFilter::Online);
        assert_eq!("offline".parse::<OnlineFilter>().unwrap(), OnlineFilter::Offline);
        assert!("down".parse::<OnlineFilter>().is_err());
    }
}
