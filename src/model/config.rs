//! Application configuration read from `scholarsim.toml`.
//!
//! ```toml
//! [engine]
//! step_size = 0.1
//! seed = 42
//! deterministic = true
//!
//! [cache]
//! backend = "sqlite"
//! path = "scholarsim-cache.db"
//! run_id = "spring-cohort"
//! ttl_secs = 86400
//!
//! [source]
//! database = "scholarsim.db"
//! ```
//!
//! Every table and key is optional; missing values take their defaults.

use scholarsim_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted cache TTL, one hundred years.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub path: PathBuf,
    /// Namespace of every cache key of a run.
    pub run_id: String,
    /// Entries older than this read as absent. `None` keeps them forever.
    pub ttl_secs: Option<u64>,
    pub timeout_ms: u64,
    pub max_conflict_retries: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: PathBuf::from("scholarsim-cache.db"),
            run_id: "default".to_string(),
            ttl_secs: None,
            timeout_ms: 2_000,
            max_conflict_retries: 3,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn ttl(&self) -> Option<chrono::Duration> {
        self.ttl_secs.map(|secs| {
            let secs = i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or(i64::MAX / 1_000);
            chrono::Duration::seconds(secs)
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub database: PathBuf,
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("scholarsim.db"),
            timeout_ms: 5_000,
        }
    }
}

impl SourceConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub source: SourceConfig,
}

impl AppConfig {
    /// Returns the first rule the configuration breaks, if any.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine.validate()?;

        anyhow::ensure!(!self.cache.run_id.trim().is_empty(), "Run id must not be empty");
        anyhow::ensure!(
            !self.cache.run_id.contains(':'),
            "Run id must not contain ':'"
        );
        anyhow::ensure!(self.cache.timeout_ms > 0, "Cache timeout must be positive");
        if let Some(ttl) = self.cache.ttl_secs {
            anyhow::ensure!(ttl > 0, "Cache TTL must be positive when set");
            anyhow::ensure!(
                ttl <= MAX_TTL_SECS,
                "Cache TTL must not exceed {MAX_TTL_SECS} seconds"
            );
        }
        anyhow::ensure!(self.source.timeout_ms > 0, "Source timeout must be positive");
        Ok(())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .map_err(|e| e.context(format!("invalid config {}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("reading {}", path.display()))),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.engine.fingerprint()
    }
}
