use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub stalker: StalkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON document file holding every collection
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Group assigned to channels without a group-title attribute
    #[serde(default = "default_group_title")]
    pub default_group: String,
    /// Bounded timeout for playlist and portal fetches, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Re-sync interval applied when a source does not configure its own
    #[serde(default = "default_sync_interval")]
    pub default_sync_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the sweep over auto-sync sources runs, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// How often tokens nearing expiry are pre-emptively refreshed
    #[serde(default = "default_token_refresh_interval")]
    pub token_refresh_interval_secs: u64,
    /// How often expired token cache entries are pruned
    #[serde(default = "default_cache_prune_interval")]
    pub cache_prune_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalkerConfig {
    /// User-Agent presented to Stalker middleware endpoints
    #[serde(default = "default_stalker_user_agent")]
    pub user_agent: String,
    /// Login used when a portal record leaves username empty
    #[serde(default)]
    pub default_username: String,
    /// Password used when a portal record leaves password empty
    #[serde(default)]
    pub default_password: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_data_file() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE)
}

fn default_group_title() -> String {
    DEFAULT_GROUP_TITLE.to_string()
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_token_refresh_interval() -> u64 {
    DEFAULT_TOKEN_REFRESH_INTERVAL_SECS
}

fn default_cache_prune_interval() -> u64 {
    DEFAULT_CACHE_PRUNE_INTERVAL_SECS
}

fn default_stalker_user_agent() -> String {
    DEFAULT_STALKER_USER_AGENT.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            default_group: default_group_title(),
            fetch_timeout_secs: default_fetch_timeout(),
            default_sync_interval_secs: default_sync_interval(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            token_refresh_interval_secs: default_token_refresh_interval(),
            cache_prune_interval_secs: default_cache_prune_interval(),
        }
    }
}

impl Default for StalkerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_stalker_user_agent(),
            default_username: String::new(),
            default_password: String::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Config::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default configuration at {config_file}");
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.ingestion.default_group, DEFAULT_GROUP_TITLE);
        assert_eq!(config.scheduler.sweep_interval_secs, 300);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[web]\nport = 9001\n").unwrap();
        assert_eq!(config.web.port, 9001);
        assert_eq!(config.web.host, DEFAULT_HOST);
        assert_eq!(config.ingestion.fetch_timeout_secs, 30);
    }
}
