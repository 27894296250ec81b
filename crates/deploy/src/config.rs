//! Project configuration consumed by the deployment flow.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{Balance, ClusterId};

/// The default name for the devstage configuration file.
pub const CONFIG_FILENAME: &str = "DevStage.toml";

/// Name of the network used when none is given.
pub const NETWORK_LOCAL: &str = "local";

/// Default block time of a local stack, in milliseconds.
pub const DEFAULT_BLOCK_TIME_MS: u64 = 6000;

/// Top level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevStageConfig {
    /// Block time of the target network, in milliseconds.
    pub block_time_ms: u64,
    /// Cluster used when a factory does not name one.
    pub main_cluster_id: ClusterId,
    /// Known networks by name.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Development accounts.
    pub accounts: AccountsConfig,
    /// Defaults applied to upload and instantiate calls.
    pub defaults: DeployDefaults,
}

impl Default for DevStageConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(NETWORK_LOCAL.to_string(), NetworkConfig::default());

        Self {
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            main_cluster_id: ClusterId::new(format!("0x{}", "0".repeat(64))),
            networks,
            accounts: AccountsConfig::default(),
            defaults: DeployDefaults::default(),
        }
    }
}

impl DevStageConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks
            .get(name)
            .with_context(|| format!("Network `{}` is not configured", name))
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from [`CONFIG_FILENAME`] inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_path = Self::resolve_path(path)?;

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Resolve a user supplied path to the configuration file it designates.
    pub fn resolve_path(path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        Ok(if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        })
    }
}

/// Endpoints of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ledger node endpoint.
    pub node_url: Url,
    /// Execution cluster worker endpoint.
    pub worker_url: Url,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_url: Url::parse("ws://localhost:9944").expect("static url is valid"),
            worker_url: Url::parse("http://localhost:8000").expect("static url is valid"),
        }
    }
}

/// Development accounts, keyed by name, each derived from a dev URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub keyrings: BTreeMap<String, String>,
    /// Account used when an operation does not name one.
    pub su_account: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        let keyrings = ["alice", "bob", "charlie", "dave", "eve", "ferdie"]
            .into_iter()
            .map(|name| {
                let mut uri = String::from("//");
                let mut chars = name.chars();
                if let Some(first) = chars.next() {
                    uri.extend(first.to_uppercase());
                    uri.push_str(chars.as_str());
                }
                (name.to_string(), uri)
            })
            .collect();

        Self {
            keyrings,
            su_account: "alice".to_string(),
        }
    }
}

/// Defaults for upload and instantiate operations.
///
/// Amounts are stored as `u64` so they stay representable in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployDefaults {
    /// Re-upload code even when the cluster already knows it.
    pub force_upload: bool,
    /// Account name used for deployments. Falls back to the keyring's `su_account`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub transfer: u64,
    pub gas_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_deposit_limit: Option<u64>,
    pub deposit: u64,
    pub transfer_to_cluster: u64,
    pub adjust_stake: u64,
}

impl Default for DeployDefaults {
    fn default() -> Self {
        Self {
            force_upload: false,
            account: None,
            transfer: 0,
            gas_limit: 1_000_000_000_000,
            storage_deposit_limit: None,
            deposit: 0,
            transfer_to_cluster: 1_000_000_000_000,
            adjust_stake: 1_000_000_000_000,
        }
    }
}

impl DeployDefaults {
    pub fn transfer(&self) -> Balance {
        Balance::from(self.transfer)
    }

    pub fn deposit(&self) -> Balance {
        Balance::from(self.deposit)
    }

    pub fn storage_deposit_limit(&self) -> Option<Balance> {
        self.storage_deposit_limit.map(Balance::from)
    }

    pub fn transfer_to_cluster(&self) -> Balance {
        Balance::from(self.transfer_to_cluster)
    }

    pub fn adjust_stake(&self) -> Balance {
        Balance::from(self.adjust_stake)
    }
}
