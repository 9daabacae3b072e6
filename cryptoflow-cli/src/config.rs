//! Combined TOML configuration for the `cryptoflow` binary.

use anyhow::{Context, Result};
use cryptoflow_core::PipelineConfig;
use cryptoflow_store::StoreConfig;
use serde::Deserialize;
use std::path::Path;

/// Overrides `[storage].database_url` when set.
pub const DATABASE_URL_ENV: &str = "CRYPTOFLOW_DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub storage: StoreConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    /// Apply the database URL override, if one was given.
    pub fn with_database_url(mut self, url: Option<String>) -> Result<Self> {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.storage.database_url = url.trim().to_string();
            self.storage.validate()?;
        }
        Ok(self)
    }
}
