//! # Starhold Server - Main Entry Point
//!
//! Authoritative server for a persistent, multiplayer 2D space game. This
//! crate is the thin process shell around `starhold_gateway`'s
//! `GameServer`: CLI parsing, configuration loading, logging setup, and
//! lifecycle orchestration.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with environment-only configuration
//! starhold
//!
//! # Specify a TOML configuration file
//! starhold --config production.toml
//!
//! # Override specific settings
//! starhold --bind 0.0.0.0:3388 --log-level debug
//!
//! # JSON logging for production
//! starhold --json-logs
//! ```
//!
//! ## Signal Handling
//!
//! The server handles graceful shutdown on SIGINT (Ctrl+C) and SIGTERM
//! (Unix systems).

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

/// Main entry point for the server binary.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
///
/// Called from an async context (`main` with `#[tokio::main]`), so it
/// should NOT have `#[tokio::main]` itself.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let log_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());
    if let Err(e) = logging::setup_logging(&log_level, args.json_logs) {
        eprintln!("failed to set up logging: {e}");
        std::process::exit(1);
    }

    logging::display_banner();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("application error: {e:?}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_without_args() {
        // clap's Command only has optional args, so an empty argv parses.
        let args = CliArgs {
            config_path: None,
            bind_address: Some("127.0.0.1:9000".to_string()),
            log_level: Some("debug".to_string()),
            json_logs: true,
        };

        assert_eq!(args.bind_address, Some("127.0.0.1:9000".to_string()));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
    }

    #[tokio::test]
    async fn application_start_fails_cleanly_without_a_database() {
        let args = CliArgs {
            config_path: None,
            bind_address: Some("127.0.0.1:0".to_string()),
            log_level: None,
            json_logs: false,
        };

        // No Postgres is reachable in this environment; `new` must return
        // an error rather than panicking.
        assert!(Application::new(args).await.is_err());
    }
}
