//! Command-line interface handling for the server binary.
//!
//! Provides argument parsing using the `clap` crate; overrides layer on
//! top of [`crate::config::load`]'s environment/TOML configuration.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// These either point at a config file to overlay onto the environment,
/// or override specific settings directly, taking precedence over both.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Optional path to a TOML configuration file.
    pub config_path: Option<PathBuf>,
    /// Optional override for the gateway bind address.
    pub bind_address: Option<String>,
    /// Optional override for log level.
    pub log_level: Option<String>,
    /// Whether to force JSON log output.
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    pub fn parse() -> Self {
        let matches = Command::new("starhold")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Authoritative server for a persistent, multiplayer 2D space game")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .help("Bind address (e.g., 0.0.0.0:3388)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: matches.get_one::<String>("config").map(PathBuf::from),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
