//! Agency Dashboard
//!
//! Realtime synchronisation and aggregation engine for an agency dashboard:
//! - Change coalescing over store subscriptions
//! - Pure view-model aggregation of clients, projects, chatbots and analytics
//! - Search and status filtering
//! - Per-entity serialised mutations with a cascading client delete
//! - A controller tying it all to one mounted account

pub mod dashboard;
pub mod error;
pub mod events;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{DashboardError, DashboardResult, ErrorCategory};

use anyhow::Result;
use dashboard::ControllerOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub dashboard: DashboardYamlConfig,
    pub store: StoreYamlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardYamlConfig {
    /// Quiet interval before a coalesced refresh, in milliseconds
    pub debounce_ms: u64,
    pub require_admin: bool,
    /// Account mounted when none is given on the command line
    pub account_id: Option<Uuid>,
}

impl Default for DashboardYamlConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            require_admin: false,
            account_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreYamlConfig {
    /// YAML or JSON fixture loaded into the in-memory store
    pub fixture_path: PathBuf,
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            fixture_path: PathBuf::from("fixture.yaml"),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub debounce_ms: u64,
    pub require_admin: bool,
    pub account_id: Option<Uuid>,
    pub fixture_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let account_id = match std::env::var("DASHBOARD_ACCOUNT_ID") {
            Ok(raw) => Some(
                Uuid::parse_str(raw.trim())
                    .map_err(|e| anyhow::anyhow!("DASHBOARD_ACCOUNT_ID is not a UUID: {}", e))?,
            ),
            Err(_) => yaml.dashboard.account_id,
        };

        Ok(Self {
            debounce_ms: std::env::var("DASHBOARD_DEBOUNCE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.dashboard.debounce_ms),
            require_admin: std::env::var("DASHBOARD_REQUIRE_ADMIN")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(yaml.dashboard.require_admin),
            account_id,
            fixture_path: std::env::var("DASHBOARD_FIXTURE")
                .map(PathBuf::from)
                .unwrap_or(yaml.store.fixture_path),
        })
    }

    /// Controller options derived from this config
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            quiet_interval: Duration::from_millis(self.debounce_ms),
            require_admin: self.require_admin,
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
