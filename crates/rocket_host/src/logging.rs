//! Logging system setup.
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` takes precedence
//! over the configured level when set.

use crate::config::LoggingSettings;
use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global log subscriber for the host.
///
/// # Arguments
///
/// * `settings` - Level and output format from the `[logging]` section
///
/// # Returns
///
/// `Ok(())` once the subscriber is installed, or an error if a global
/// subscriber was already set.
///
/// # Example
///
/// ```rust,ignore
/// let config = AppConfig::load_from_file(Path::new("rocket.toml")).await?;
/// logging::setup_logging(&config.logging)?;
/// ```
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let level = settings.level.as_filter();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if settings.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .try_init()
    };
    result.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    info!("🔧 Logging initialized with level: {}", settings.level);
    Ok(())
}
