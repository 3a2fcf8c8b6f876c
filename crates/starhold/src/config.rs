//! Configuration loading for the server binary.
//!
//! A thin overlay in front of `starhold_gateway::ServerConfig::from_env()`:
//! an optional TOML file supplies defaults for any environment variable
//! not already set, and CLI flags take precedence over both.

use crate::cli::CliArgs;
use starhold_gateway::ServerConfig;
use std::collections::HashMap;
use std::path::Path;

/// Loads the server configuration, applying (in increasing precedence)
/// environment defaults, an optional TOML file, then CLI overrides.
pub fn load(cli: &CliArgs) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.config_path {
        overlay_toml_onto_env(path)?;
    }

    let mut config = ServerConfig::from_env();

    if let Some(bind) = &cli.bind_address {
        config.bind_address = bind
            .parse()
            .map_err(|e| format!("invalid --bind address {bind:?}: {e}"))?;
    }

    Ok(config)
}

/// Maps flat TOML keys onto the environment variable names
/// `ServerConfig::from_env` reads, without overwriting variables the
/// environment already set.
fn overlay_toml_onto_env(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let table: HashMap<String, toml::Value> = toml::from_str(&text)?;

    const KEYS: &[(&str, &str)] = &[
        ("host", "HOST"),
        ("port", "PORT"),
        ("max_connections", "MAX_CONNECTIONS"),
        ("connection_timeout_secs", "CONNECTION_TIMEOUT_SECS"),
        ("tick_interval_ms", "TICK_MS"),
        ("database_url", "DATABASE_URL"),
        ("galaxy_seed", "GALAXY_SEED"),
        ("session_secret", "SESSION_SECRET"),
        ("token_expiry_secs", "TOKEN_EXPIRY"),
        ("login_rate_limit_per_min", "LOGIN_RATE_LIMIT"),
        ("register_rate_limit_per_min", "REGISTER_RATE_LIMIT"),
        ("outbound_queue_capacity", "OUTBOUND_QUEUE_CAPACITY"),
        ("log_level", "RUST_LOG"),
    ];

    for (toml_key, env_key) in KEYS {
        if std::env::var(env_key).is_ok() {
            continue;
        }
        if let Some(value) = table.get(*toml_key) {
            let rendered = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            std::env::set_var(env_key, rendered);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = CliArgs {
            config_path: Some("/nonexistent/path/config.toml".into()),
            bind_address: None,
            log_level: None,
            json_logs: false,
        };
        assert!(load(&cli).is_err());
    }

    #[test]
    fn loads_defaults_without_a_config_file() {
        let cli = CliArgs {
            config_path: None,
            bind_address: None,
            log_level: None,
            json_logs: false,
        };
        assert!(load(&cli).is_ok());
    }

    #[test]
    fn cli_bind_override_takes_precedence() {
        let cli = CliArgs {
            config_path: None,
            bind_address: Some("127.0.0.1:9999".to_string()),
            log_level: None,
            json_logs: false,
        };
        let config = load(&cli).expect("config loads");
        assert_eq!(config.bind_address.port(), 9999);
    }

    #[test]
    fn invalid_bind_override_is_rejected() {
        let cli = CliArgs {
            config_path: None,
            bind_address: Some("not-an-address".to_string()),
            log_level: None,
            json_logs: false,
        };
        assert!(load(&cli).is_err());
    }

    #[test]
    fn toml_file_seeds_unset_environment_variables() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "max_connections = 42").expect("write");

        std::env::remove_var("MAX_CONNECTIONS");
        overlay_toml_onto_env(file.path()).expect("overlay succeeds");
        assert_eq!(std::env::var("MAX_CONNECTIONS").as_deref(), Ok("42"));
        std::env::remove_var("MAX_CONNECTIONS");
    }
}
