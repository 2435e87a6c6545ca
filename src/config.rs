use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the slice lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub erasure: ErasureConfig,
    pub transport: TransportConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the sharded slice store.
    pub root_dir: PathBuf,
    /// Cap on segments in a single slice container.
    pub max_xref_entries: usize,
    /// Whether to AES-CTR-encrypt shards before Reed-Solomon encoding.
    pub shard_encrypt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards.
    pub data_pieces_k: usize,
    /// Number of parity shards.
    pub parity_pieces_m: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-piece retry count before falling back to pub/sub.
    pub upload_retry_limit: u32,
    /// Stream request timeout, in seconds.
    pub stream_deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum gap between identical search/grant requests, in seconds.
    pub search_rate_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub structured: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                root_dir: PathBuf::from("./slicemesh-data"),
                max_xref_entries: 64,
                shard_encrypt: false,
            },
            erasure: ErasureConfig {
                data_pieces_k: 4,
                parity_pieces_m: 2,
            },
            transport: TransportConfig {
                upload_retry_limit: 3,
                stream_deadline_secs: 10,
            },
            search: SearchConfig {
                search_rate_window_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                structured: true,
                log_file: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load_or_default(config_path: Option<PathBuf>) -> crate::error::DfsResult<Self> {
        if let Some(path) = config_path {
            if path.exists() {
                let config_str = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&config_str)
                    .map_err(|e| crate::error::DfsError::Config(format!("config parse error: {}", e)))?;
                tracing::info!("loaded configuration from {:?}", path);
                return Ok(config);
            }
        }

        tracing::info!("using default configuration");
        Ok(Config::default())
    }

    /// Save configuration to file.
    pub fn save(&self, config_path: &PathBuf) -> crate::error::DfsResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DfsError::Config(format!("config serialize error: {}", e)))?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(config_path, config_str)?;
        tracing::info!("configuration saved to {:?}", config_path);
        Ok(())
    }

    pub fn stream_deadline(&self) -> Duration {
        Duration::from_secs(self.transport.stream_deadline_secs)
    }

    pub fn search_rate_window(&self) -> Duration {
        Duration::from_secs(self.search.search_rate_window_secs)
    }
}
