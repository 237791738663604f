//! Application configuration for chordsync.
//!
//! User config lives at `~/.chordsync/chordsync.toml`.
//! CLI flags override config file values, which override defaults.
//! The file never holds store credentials, only the names of the
//! environment variables holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ChordsyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chordsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chordsync";

// ---------------------------------------------------------------------------
// Config structs (matching chordsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline run defaults.
    #[serde(default)]
    pub run: RunDefaultsConfig,

    /// Downstream sink settings.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Object-store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaultsConfig {
    /// Which record source to drive.
    #[serde(default = "default_source")]
    pub source: String,

    /// Maximum normalized records per run; 0 means unlimited.
    #[serde(default)]
    pub max_records: usize,

    /// Concurrent detail fetches per chunk.
    #[serde(default = "default_detail_width")]
    pub detail_width: usize,

    /// Concurrent normalizations per chunk.
    #[serde(default = "default_normalize_width")]
    pub normalize_width: usize,

    /// Hour of day (0–23) for the daily scheduled run.
    #[serde(default = "default_start_hour")]
    pub start_hour: u8,

    /// Also run once when the daemon starts.
    #[serde(default)]
    pub run_at_start: bool,

    /// Write a diagnostic snapshot of all normalized records before dispatch.
    #[serde(default)]
    pub snapshot: bool,

    /// Per-asset fetch timeout in seconds.
    #[serde(default = "default_asset_timeout_secs")]
    pub asset_timeout_secs: u64,
}

impl Default for RunDefaultsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            max_records: 0,
            detail_width: default_detail_width(),
            normalize_width: default_normalize_width(),
            start_hour: default_start_hour(),
            run_at_start: false,
            snapshot: false,
            asset_timeout_secs: default_asset_timeout_secs(),
        }
    }
}

fn default_source() -> String {
    "holychords".into()
}
fn default_detail_width() -> usize {
    50
}
fn default_normalize_width() -> usize {
    100
}
fn default_start_hour() -> u8 {
    3
}
fn default_asset_timeout_secs() -> u64 {
    5
}

/// `[sink]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// WebSocket address of the downstream consumer.
    #[serde(default = "default_sink_address")]
    pub address: String,

    /// Seconds to wait for a per-emit acknowledgement.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            address: default_sink_address(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

fn default_sink_address() -> String {
    "ws://127.0.0.1:3000/parser".into()
}
fn default_ack_timeout_secs() -> u64 {
    10
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket holding deduplicated assets.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Endpoint host of the S3-compatible service (no scheme).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Region passed to the S3 client.
    #[serde(default = "default_region")]
    pub region: String,

    /// Name of the env var holding the access key (never the key itself).
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Name of the env var holding the secret key (never the key itself).
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint: default_endpoint(),
            region: default_region(),
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
        }
    }
}

fn default_bucket() -> String {
    "chordsync-assets".into()
}
fn default_endpoint() -> String {
    "ams3.digitaloceanspaces.com".into()
}
fn default_region() -> String {
    "ams3".into()
}
fn default_access_key_env() -> String {
    "SPACES_KEY".into()
}
fn default_secret_key_env() -> String {
    "SPACES_SECRET".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Record source name (selects the extraction variant).
    pub source: String,
    /// Maximum normalized records per run; `None` means unlimited.
    pub max_records: Option<usize>,
    /// Concurrent detail fetches per chunk.
    pub detail_width: usize,
    /// Concurrent normalizations per chunk.
    pub normalize_width: usize,
    /// Write a diagnostic snapshot before dispatch.
    pub snapshot: bool,
    /// Directory the snapshot file is written into.
    pub snapshot_dir: PathBuf,
    /// Per-asset fetch timeout in seconds.
    pub asset_timeout_secs: u64,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source: config.run.source.clone(),
            max_records: match config.run.max_records {
                0 => None,
                n => Some(n),
            },
            detail_width: config.run.detail_width,
            normalize_width: config.run.normalize_width,
            snapshot: config.run.snapshot,
            snapshot_dir: PathBuf::from("."),
            asset_timeout_secs: config.run.asset_timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chordsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChordsyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chordsync/chordsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChordsyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ChordsyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ChordsyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ChordsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChordsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the store credentials from the env vars named in the config.
/// Returns `(access_key, secret_key)`.
pub fn store_credentials(config: &AppConfig) -> Result<(String, String)> {
    let read = |var_name: &str| -> Result<String> {
        match std::env::var(var_name) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Err(ChordsyncError::config(format!(
                "object-store credential not found. Set the {var_name} environment variable."
            ))),
        }
    };

    Ok((
        read(&config.store.access_key_env)?,
        read(&config.store.secret_key_env)?,
    ))
}
