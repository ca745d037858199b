//! Archive configuration.
//!
//! Loaded once at startup from a TOML file and passed by reference into every
//! component constructor. Nothing in this crate reads configuration through a
//! global; the value is immutable for the duration of a run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::VaultError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Which storage engine backs the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// SQLite database file path
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_pg_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_pg_database")]
    pub database: String,

    #[serde(default = "default_pg_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Maximum concurrent connections in the pool
    #[serde(default = "default_pg_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Messages fetched and committed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// What to do on the first sync of a conversation
    #[serde(default)]
    pub initial_sync: InitialSync,
}

/// First-sync policy for a conversation with no stored cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialSync {
    /// Fetch from the oldest retrievable message
    #[default]
    Full,
    /// Seed the cursor at the remote's latest message; no history backfill
    NewOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Global download toggle. Off records every attachment as skipped-by-policy.
    #[serde(default = "default_true")]
    pub download: bool,

    /// Attachments above this size are recorded as skipped-too-large
    #[serde(default = "default_media_max_mb")]
    pub max_size_mb: u64,

    /// Root directory for downloaded media, one subdirectory per conversation
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,

    /// Concurrent downloads while draining the media queue
    #[serde(default = "default_media_concurrency")]
    pub concurrency: usize,
}

impl MediaConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Conversation ids synced regardless of classification (unless excluded)
    #[serde(default)]
    pub include: Vec<i64>,

    /// Conversation ids never synced. Exclusion wins over inclusion.
    #[serde(default)]
    pub exclude: Vec<i64>,

    #[serde(default)]
    pub direct: ScopeConfig,

    #[serde(default)]
    pub groups: ScopeConfig,

    #[serde(default)]
    pub channels: ScopeConfig,
}

/// Per-classification filter scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub include: Vec<i64>,

    #[serde(default)]
    pub exclude: Vec<i64>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Off by default: no edit/delete tracking, simpler mode
    #[serde(default)]
    pub enabled: bool,

    /// How many of the newest messages per conversation the pass re-lists
    #[serde(default = "default_reconcile_window")]
    pub window: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: default_reconcile_window(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            postgres: PostgresConfig::default(),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            port: default_pg_port(),
            database: default_pg_database(),
            user: default_pg_user(),
            password: String::new(),
            pool_size: default_pg_pool_size(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            initial_sync: InitialSync::Full,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            download: true,
            max_size_mb: default_media_max_mb(),
            dir: default_media_dir(),
            concurrency: default_media_concurrency(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let content = fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| VaultError::Config(format!("Failed to parse config: {}", e)))
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Sqlite
}

fn default_sqlite_path() -> PathBuf {
    data_dir().join("archive.db")
}

fn default_media_dir() -> PathBuf {
    data_dir().join("media")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatvault")
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_database() -> String {
    "chatvault".to_string()
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

fn default_pg_pool_size() -> u32 {
    5
}

fn default_batch_size() -> u32 {
    100
}

fn default_media_max_mb() -> u64 {
    100
}

fn default_media_concurrency() -> usize {
    4
}

fn default_reconcile_window() -> u32 {
    200
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.sync.initial_sync, InitialSync::Full);
        assert!(config.media.download);
        assert_eq!(config.media.max_size_mb, 100);
        assert!(!config.reconcile.enabled);
        assert_eq!(config.reconcile.window, 200);
        assert!(config.filter.direct.enabled);
        assert!(config.filter.channels.enabled);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "postgres"

            [storage.postgres]
            host = "db.internal"
            password = "secret"
            pool_size = 8

            [sync]
            batch_size = 250
            initial_sync = "new_only"

            [media]
            download = false
            max_size_mb = 50

            [filter]
            exclude = [777]

            [filter.channels]
            enabled = false
            include = [42]

            [reconcile]
            enabled = true
            window = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, BackendKind::Postgres);
        assert_eq!(config.storage.postgres.host, "db.internal");
        assert_eq!(config.storage.postgres.pool_size, 8);
        assert_eq!(config.sync.batch_size, 250);
        assert_eq!(config.sync.initial_sync, InitialSync::NewOnly);
        assert!(!config.media.download);
        assert_eq!(config.media.max_size_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.filter.exclude, vec![777]);
        assert!(!config.filter.channels.enabled);
        assert_eq!(config.filter.channels.include, vec![42]);
        assert!(config.reconcile.enabled);
        assert_eq!(config.reconcile.window, 50);
    }
}
