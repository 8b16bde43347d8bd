//! Engine configuration
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are layered: defaults, then an optional
//! config file, then `SUBLINK_`-prefixed environment variables
//! (`SUBLINK_API__BASE_URL`, `SUBLINK_SYNC__MAX_RETRIES`, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            token: None,
            connect_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Alignments per fetch
    pub batch_size: u32,
    /// Loaded batches kept in memory per content session
    pub cached_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            cached_batches: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub default_speed_ms: u64,
    pub min_speed_ms: u64,
    pub max_speed_ms: u64,
}

impl PlaybackConfig {
    pub fn clamp_speed(&self, speed_ms: u64) -> u64 {
        speed_ms.clamp(self.min_speed_ms, self.max_speed_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_speed_ms: 3_000,
            min_speed_ms: 1_000,
            max_speed_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Uncommitted advances that trigger a write
    pub commit_every: u32,
    /// Seconds after which any pending advance is written
    pub commit_ceiling_secs: u64,
    /// Replay attempts per queued write before it is dropped
    pub max_retries: u32,
    /// Queued writes kept before the oldest is dropped
    pub max_queue_len: usize,
    /// Budget for the final write on close
    pub flush_timeout_ms: u64,
    /// Health probe interval while the probe loop runs
    pub probe_interval_secs: u64,
}

impl SyncConfig {
    pub fn commit_ceiling(&self) -> Duration {
        Duration::from_secs(self.commit_ceiling_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commit_every: 5,
            commit_ceiling_secs: 30,
            max_retries: 3,
            max_queue_len: 100,
            flush_timeout_ms: 3_000,
            probe_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Hours a locally saved session stays trustworthy
    pub freshness_hours: i64,
    /// Directory for the file-backed store. `None` leaves the choice to the embedder.
    pub directory: Option<PathBuf>,
}

impl StorageConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            freshness_hours: 24,
            directory: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Without an explicit path, `sublink.{toml,json}` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => settings.add_source(config::File::from(path.to_path_buf()).required(true)),
            None => settings.add_source(config::File::with_name("sublink").required(false)),
        };

        settings = settings.add_source(
            config::Environment::with_prefix("SUBLINK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = settings
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(EngineError::Config("api.base_url is required".to_string()));
        }
        if self.batch.batch_size == 0 {
            return Err(EngineError::Config("batch.batch_size must be positive".to_string()));
        }
        if self.batch.cached_batches == 0 {
            return Err(EngineError::Config("batch.cached_batches must be positive".to_string()));
        }
        let playback = &self.playback;
        if playback.min_speed_ms == 0 || playback.min_speed_ms > playback.max_speed_ms {
            return Err(EngineError::Config(format!(
                "playback speed range {}..={} is invalid",
                playback.min_speed_ms, playback.max_speed_ms
            )));
        }
        if self.sync.commit_every == 0 {
            return Err(EngineError::Config("sync.commit_every must be positive".to_string()));
        }
        if self.storage.freshness_hours <= 0 {
            return Err(EngineError::Config("storage.freshness_hours must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.batch_size, 50);
        assert_eq!(config.sync.commit_every, 5);
        assert_eq!(config.sync.commit_ceiling(), Duration::from_secs(30));
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.storage.freshness(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_clamp_speed() {
        let playback = PlaybackConfig::default();
        assert_eq!(playback.clamp_speed(200), 1_000);
        assert_eq!(playback.clamp_speed(2_500), 2_500);
        assert_eq!(playback.clamp_speed(9_000), 5_000);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[api]\nbase_url = \"https://subs.example.com\"\n\n[sync]\nmax_retries = 5").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "https://subs.example.com");
        assert_eq!(config.sync.max_retries, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.sync.commit_every, 5);
        assert_eq!(config.playback.max_speed_ms, 5_000);
    }

    #[test]
    fn test_rejects_inverted_speed_range() {
        let mut config = EngineConfig::default();
        config.playback.min_speed_ms = 6_000;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }
}
