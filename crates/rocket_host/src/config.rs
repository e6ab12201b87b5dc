//! Configuration management for the Rocket host.
//!
//! Loads the TOML configuration file, writing a default one on first start,
//! and validates the result before anything else is set up.

use anyhow::{bail, Context, Result};
use rocket_events::{EventManagerConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_tick_interval() -> u64 {
    1000
}

fn default_motd() -> String {
    "Welcome to the server!".to_string()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Event manager settings
    #[serde(default)]
    pub events: EventManagerConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Demo plugin settings
    #[serde(default)]
    pub demo: DemoSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    #[serde(default)]
    pub level: LogLevel,
    /// JSON formatting
    #[serde(default)]
    pub json_format: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Interval between server tick events in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Message the welcome plugin greets players with
    #[serde(default = "default_motd")]
    pub motd: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            motd: default_motd(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is created at
    /// that path and the defaults are returned.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the TOML file
    ///
    /// # Returns
    ///
    /// The parsed configuration. Missing sections and fields take their
    /// defaults. Unreadable or malformed files are an error.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = AppConfig::load_from_file(Path::new("rocket.toml")).await?;
    /// config.validate()?;
    /// ```
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration, failing with every issue found.
    pub fn validate(&self) -> Result<()> {
        let mut issues = self.events.validate();
        if self.demo.tick_interval_ms == 0 {
            issues.push("demo.tick_interval_ms must be greater than zero".to_string());
        }

        if !issues.is_empty() {
            bail!("Configuration validation failed: {}", issues.join("; "));
        }
        Ok(())
    }
}
