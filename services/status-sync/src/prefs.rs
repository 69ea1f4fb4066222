//! Persisted UI preferences
//!
//! View mode, selected group, and online filter survive restarts in a small
//! JSON file. Loading is lenient per key: a missing or corrupt file, or an
//! unknown value for one key, falls back to that key's default instead of
//! discarding the rest.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::projector::{FilterState, OnlineFilter};

/// How the node list is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Grid,
    Table,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Grid
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Grid => write!(f, "grid"),
            ViewMode::Table => write!(f, "table"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "grid" => Ok(ViewMode::Grid),
            "table" => Ok(ViewMode::Table),
            _ => Err(SyncError::Config(format!("Unknown view mode: {}", s))),
        }
    }
}

/// UI preferences reloaded at startup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub view_mode: ViewMode,
    /// `"all"` selects every group
    pub selected_group: Option<String>,
    pub online_filter: OnlineFilter,
}

/// On-disk shape; every key optional so one bad value cannot poison the rest
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    view_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    online_filter: Option<String>,
}

impl Preferences {
    /// Load preferences from `path`, falling back to defaults on any problem
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No preferences at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let file: PreferencesFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                debug!("Ignoring corrupt preferences file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let view_mode = file
            .view_mode
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let selected_group = match file.selected_group {
            Some(group) if group != "all" && !group.is_empty() => Some(group),
            _ => None,
        };
        let online_filter = file
            .online_filter
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            view_mode,
            selected_group,
            online_filter,
        }
    }

    /// Persist preferences to `path`
    pub fn store(&self, path: &Path) -> Result<()> {
        let file = PreferencesFile {
            view_mode: Some(self.view_mode.to_string()),
            selected_group: Some(
                self.selected_group
                    .clone()
                    .unwrap_or_else(|| "all".to_string()),
            ),
            online_filter: Some(self.online_filter.to_string()),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Filter state seeded from the persisted preferences
    pub fn filter_state(&self) -> FilterState {
        FilterState {
            search: String::new(),
            group: self.selected_group.clone(),
            online: self.online_filter,
        }
    }
}
