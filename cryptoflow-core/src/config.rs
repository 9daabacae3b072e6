//! Pipeline configuration.
//!
//! Built once at process start (usually from the `[pipeline]` table of a TOML
//! file) and passed by reference. Nothing in the pipeline reads the
//! environment.

use crate::domain::{FetchTarget, TimeRange};
use crate::fetch::RetryPolicy;
use crate::plan::cartesian_targets;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Upper bound on `history_days` (about a century).
pub const MAX_HISTORY_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the fetch/normalize pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Market-data API root, e.g. `https://api.coingecko.com/api/v3`.
    pub base_url: String,
    /// Maximum in-flight requests.
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    /// Length of the history window ending now.
    pub history_days: u32,
    pub instruments: Vec<String>,
    pub currencies: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: 3,
            request_timeout_secs: 15,
            history_days: 100,
            instruments: vec!["bitcoin".into(), "ethereum".into()],
            currencies: vec!["usd".into(), "eur".into()],
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file containing only pipeline keys.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.history_days == 0 {
            return Err(ConfigError::Invalid("history_days must be at least 1".into()));
        }
        if self.history_days > MAX_HISTORY_DAYS {
            return Err(ConfigError::Invalid(format!(
                "history_days must be at most {MAX_HISTORY_DAYS}, got {}",
                self.history_days
            )));
        }
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("instruments list is empty".into()));
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::Invalid("currencies list is empty".into()));
        }
        if let Some(blank) = self
            .instruments
            .iter()
            .chain(self.currencies.iter())
            .find(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "blank instrument or currency entry: '{blank}'"
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Every (instrument, currency) pair, instrument-major.
    pub fn targets(&self) -> Vec<FetchTarget> {
        cartesian_targets(&self.instruments, &self.currencies)
    }

    /// History window ending at `now`.
    pub fn time_range(&self, now: DateTime<Utc>) -> Result<TimeRange, ConfigError> {
        TimeRange::trailing_days(now, self.history_days).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "history_days = {} reaches before the earliest representable date",
                self.history_days
            ))
        })
    }
}
