//! Configuration for stockroom

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockroom")
}

/// How a missing assignment is interpreted
///
/// `Open`: no assignment rows means no restriction.
/// `Closed`: no assignment rows means nothing is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnassignedPolicy {
    #[default]
    Open,
    Closed,
}

impl UnassignedPolicy {
    pub fn is_open(&self) -> bool {
        matches!(self, UnassignedPolicy::Open)
    }
}

/// Fallback behaviour for employees and shops without assignment rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    /// Employee with no session assignments at all
    #[serde(default)]
    pub unassigned_sessions: UnassignedPolicy,

    /// Shop with no shop-item assignments
    #[serde(default)]
    pub unassigned_shop_items: UnassignedPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound applied to boxes and singles before saving
    #[serde(default = "default_max_quantity")]
    pub max_quantity: i32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_quantity: default_max_quantity(),
        }
    }
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and the saved config
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite file name inside storage_dir
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// How long a writer waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// HS256 secret for bearer tokens (required unless dev_mode)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime for tokens issued by this service
    #[serde(default = "default_token_expiry_secs")]
    pub token_expiry_secs: u64,

    /// Accept X-User-Id / X-User-Role / X-Tenant-Id headers instead of tokens
    #[serde(default)]
    pub dev_mode: bool,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_database_file() -> String {
    "stockroom.db".to_string()
}

fn default_http_port() -> u16 {
    8095
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_token_expiry_secs() -> u64 {
    8 * 60 * 60
}

fn default_max_quantity() -> i32 {
    999_999
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            http_port: default_http_port(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            jwt_secret: None,
            token_expiry_secs: default_token_expiry_secs(),
            dev_mode: false,
            log_json: false,
            access: AccessConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
