//! Configuration for the points core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Points core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Writer actor configuration
    pub store: StoreConfig,

    /// Reservation code configuration
    pub reservation: ReservationConfig,

    /// Ledger history paging
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/points"),
            service_name: "points-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
            rocksdb: RocksDBConfig::default(),
            store: StoreConfig::default(),
            reservation: ReservationConfig::default(),
            history: HistoryConfig::default(),
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

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every write
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,

    /// Upper bound for a single storage request (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            request_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Reservation code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// Code prefix, e.g. `RES`
    pub prefix: String,

    /// Random characters after the prefix
    pub code_length: usize,

    /// Candidates tried at `code_length`
    pub max_attempts: u32,

    /// Longer length used once `max_attempts` collided
    pub fallback_code_length: usize,

    /// Candidates tried at `fallback_code_length`
    pub fallback_attempts: u32,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            prefix: "RES".to_string(),
            code_length: 8,
            max_attempts: 5,
            fallback_code_length: 12,
            fallback_attempts: 3,
        }
    }
}

/// Ledger history paging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Entries returned when the caller gives no limit
    pub default_limit: usize,

    /// Hard cap on requested limits
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

impl HistoryConfig {
    /// Resolve a caller-supplied limit
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("POINTS_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("POINTS_METRICS_ADDR") {
            config.metrics_listen_addr = addr;
        }

        if let Ok(timeout) = std::env::var("POINTS_REQUEST_TIMEOUT_MS") {
            config.store.request_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("POINTS_REQUEST_TIMEOUT_MS: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the core misbehave
    pub fn validate(&self) -> crate::Result<()> {
        let reservation = &self.reservation;

        if reservation.prefix.is_empty()
            || !reservation
                .prefix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(crate::Error::Config(format!(
                "reservation.prefix must be non-empty [A-Z0-9], got {:?}",
                reservation.prefix
            )));
        }
        if reservation.code_length == 0 {
            return Err(crate::Error::Config(
                "reservation.code_length must be positive".to_string(),
            ));
        }
        if reservation.max_attempts == 0 {
            return Err(crate::Error::Config(
                "reservation.max_attempts must be positive".to_string(),
            ));
        }
        if reservation.fallback_code_length < reservation.code_length {
            return Err(crate::Error::Config(
                "reservation.fallback_code_length must not be shorter than code_length"
                    .to_string(),
            ));
        }
        if self.store.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "store.mailbox_capacity must be positive".to_string(),
            ));
        }
        if self.store.request_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "store.request_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
