//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the durable store
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Which account store backs the ledger
    pub backend: StoreBackend,

    /// Broadcast buffer per live event subscriber
    pub event_buffer: usize,

    /// Coordinator mailbox depth (backpressure bound)
    pub mailbox_capacity: usize,

    /// RocksDB tuning
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            backend: StoreBackend::Rocks,
            event_buffer: 1024,
            mailbox_capacity: 1000,
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Account store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile in-memory store
    Memory,
    /// Durable RocksDB store
    Rocks,
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
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

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("LEDGER_BACKEND") {
            config.backend = match backend.as_str() {
                "memory" => StoreBackend::Memory,
                "rocks" => StoreBackend::Rocks,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown store backend: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(buffer) = std::env::var("LEDGER_EVENT_BUFFER") {
            config.event_buffer = buffer
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid event buffer: {}", buffer)))?;
        }

        Ok(config)
    }

    /// In-memory configuration for embedded and test use
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }
}
