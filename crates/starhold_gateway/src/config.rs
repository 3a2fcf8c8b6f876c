//! Server configuration: network binding, session/auth knobs,
//! and the [`SecurityConfig`] input-validation thresholds. Values are read
//! from the environment with the documented defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address the WebSocket gateway binds to.
    pub bind_address: SocketAddr,

    /// The socket address the `/health` HTTP endpoint binds to.
    pub health_bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed.
    pub max_connections: usize,

    /// Idle connection timeout, seconds.
    pub connection_timeout_secs: u64,

    /// Simulation tick interval, milliseconds. Mirrors
    /// `starhold_core::constants::TICK_MS`; kept as a config field so an
    /// operator can observe it, not so it can diverge from the engine.
    pub tick_interval_ms: u64,

    /// Postgres connection string for `starhold_persistence::Store`.
    pub database_url: String,

    /// Deterministic world seed (`GALAXY_SEED`).
    pub galaxy_seed: u64,

    /// Secret used in session token derivation. Tokens themselves are
    /// opaque 128-bit random values; the secret is retained as a config
    /// surface for operators.
    pub session_secret: String,

    /// Bearer token time-to-live, seconds (`TOKEN_EXPIRY`, default 24h).
    pub token_expiry_secs: u64,

    /// `auth:login` attempts allowed per IP per minute.
    pub login_rate_limit_per_min: u32,

    /// `auth:register` attempts allowed per IP per minute.
    pub register_rate_limit_per_min: u32,

    /// Bounded outbound queue capacity per connection before the client
    /// is disconnected with a `backpressure` reason.
    pub outbound_queue_capacity: usize,

    /// General input-validation/security thresholds.
    pub security: SecurityConfig,
}

/// Security configuration for input validation and protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_rate_limiting: bool,
    pub max_requests_per_minute: u32,
    pub max_message_size: usize,
    pub max_json_depth: usize,
    pub max_string_length: usize,
    pub max_collection_size: usize,
    pub enable_ddos_protection: bool,
    pub banned_ips: Vec<std::net::IpAddr>,
    pub max_connections_per_ip: u32,
}

impl ServerConfig {
    /// Builds configuration from the environment.
    /// Unset variables fall back to the documented defaults.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3388);
        let bind_address = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| "0.0.0.0:3388".parse().unwrap());
        let health_port = port.saturating_add(1);
        let health_bind_address = format!("{host}:{health_port}")
            .parse()
            .unwrap_or_else(|_| "0.0.0.0:3389".parse().unwrap());

        Self {
            bind_address,
            health_bind_address,
            max_connections: env_or("MAX_CONNECTIONS", 1000),
            connection_timeout_secs: env_or("CONNECTION_TIMEOUT_SECS", 60),
            tick_interval_ms: env_or("TICK_MS", starhold_core::constants::TICK_MS),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/starhold".to_string()),
            galaxy_seed: env_or("GALAXY_SEED", 42),
            session_secret: std::env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "dev-insecure-session-secret".to_string()),
            token_expiry_secs: env_or("TOKEN_EXPIRY", 24 * 60 * 60),
            login_rate_limit_per_min: env_or("LOGIN_RATE_LIMIT", 10),
            register_rate_limit_per_min: env_or("REGISTER_RATE_LIMIT", 5),
            outbound_queue_capacity: env_or("OUTBOUND_QUEUE_CAPACITY", 256),
            security: SecurityConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3388".parse().expect("valid default bind address"),
            health_bind_address: "127.0.0.1:3389".parse().expect("valid default health address"),
            max_connections: 1000,
            connection_timeout_secs: 60,
            tick_interval_ms: starhold_core::constants::TICK_MS,
            database_url: "postgres://localhost/starhold".to_string(),
            galaxy_seed: 42,
            session_secret: "dev-insecure-session-secret".to_string(),
            token_expiry_secs: 24 * 60 * 60,
            login_rate_limit_per_min: 10,
            register_rate_limit_per_min: 5,
            outbound_queue_capacity: 256,
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            max_requests_per_minute: 120,
            max_message_size: 64 * 1024,
            max_json_depth: 10,
            max_string_length: 1024,
            max_collection_size: 100,
            enable_ddos_protection: true,
            banned_ips: Vec::new(),
            max_connections_per_ip: 10,
        }
    }
}
