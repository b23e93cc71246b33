//! Configuration for the report platform

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Source API configuration
    pub source_api: SourceApiConfig,

    /// Import scheduler configuration
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/reports"),
            service_name: "report-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            source_api: SourceApiConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 128,
            max_write_buffer_number: 4,
            target_file_size_mb: 128,
            max_background_jobs: 4,
        }
    }
}

/// Source accounting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceApiConfig {
    /// Base URL of the source API
    pub base_url: String,

    /// API key sent in the `XApiKey` header
    pub api_key: String,

    /// Per-fetch timeout (seconds). A fetch that exceeds this fails the
    /// company's import terminally.
    pub fetch_timeout_secs: u64,
}

impl Default for SourceApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            fetch_timeout_secs: 120,
        }
    }
}

/// Import scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between spawning successive per-company import tasks (seconds)
    pub stagger_delay_secs: u64,

    /// Worker threads used for parallel report assembly
    pub assembly_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stagger_delay_secs: 20,
            assembly_workers: 4,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("REPORTS_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(url) = std::env::var("REPORTS_SOURCE_API_URL") {
            config.source_api.base_url = url;
        }

        if let Ok(key) = std::env::var("REPORTS_SOURCE_API_KEY") {
            config.source_api.api_key = key;
        }

        if let Ok(secs) = std::env::var("REPORTS_FETCH_TIMEOUT_SECS") {
            config.source_api.fetch_timeout_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid timeout: {}", e)))?;
        }

        Ok(config)
    }
}
