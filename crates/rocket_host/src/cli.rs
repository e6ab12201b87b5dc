//! Command-line interface handling for the Rocket host.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Options given here override the matching configuration file settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to trace every dispatch at DEBUG level
    pub trace_dispatch: bool,
    /// Run the demo once and exit instead of waiting for a shutdown signal
    pub once: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rocket.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            trace_dispatch: matches.get_flag("trace-dispatch"),
            once: matches.get_flag("once"),
        }
    }
}

fn command() -> Command {
    Command::new("Rocket Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hosts the Rocket event manager with a set of demo plugins")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("rocket.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (debug, info, warn, error, fatal)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("trace-dispatch")
                .long("trace-dispatch")
                .help("Log every emit and handler invocation")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run the demo once and exit")
                .action(clap::ArgAction::SetTrue),
        )
}
