//! Logging levels and a per-caller logger handle.
//!
//! The event core only talks to the `tracing` facade; which subscriber
//! receives the records is decided by the host process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Log severity, from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed information for debugging
    Debug,
    /// General informational messages
    Info,
    /// Warning conditions that should be investigated
    Warn,
    /// Errors that affect a single operation
    Error,
    /// Errors that leave the process unable to continue
    Fatal,
}

impl LogLevel {
    /// Returns the `tracing` filter directive for this level.
    ///
    /// `Fatal` has no `tracing` counterpart and filters as `error`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Logger bound to one source, typically a plugin or listener.
///
/// # Examples
///
/// ```rust
/// use rocket_events::{LogLevel, Logger};
///
/// let log = Logger::new("economy");
/// log.info("balances loaded");
/// log.log(LogLevel::Warn, "bank file missing, starting empty");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    source: String,
}

impl Logger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let source = self.source.as_str();
        match level {
            LogLevel::Debug => debug!(source, "{}", message),
            LogLevel::Info => info!(source, "{}", message),
            LogLevel::Warn => warn!(source, "{}", message),
            LogLevel::Error => error!(source, "{}", message),
            LogLevel::Fatal => error!(source, fatal = true, "{}", message),
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }
}
