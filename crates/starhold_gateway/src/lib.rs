//! The WebSocket gateway: the only part of this server that touches a
//! socket. Everything here is infrastructure — accepting connections,
//! authenticating them, enforcing backpressure and rate limits, and
//! turning wire `Envelope`s into calls against [`starhold_sim::Engine`].
//! No game rule lives in this crate; it only knows how to get a command
//! to the engine and a reply back to the right connection.
//!
//! ## Connection lifecycle
//!
//! 1. A TCP accept loop performs the WebSocket handshake and spawns one
//!    reader/writer task pair per client (`server::handlers::handle_connection`).
//! 2. The connection starts unauthenticated. Only `auth:register`,
//!    `auth:login`, `auth:validate`, and `ping` are accepted in this
//!    state; anything else is a silent protocol error.
//! 3. Once [`session::SessionManager`] mints a token, every later envelope
//!    is dispatched through [`starhold_sim::Engine::handle_command`] on
//!    behalf of the resolved user.
//! 4. On disconnect (client close, backpressure, or shutdown) the
//!    connection drops out of the connection table and the engine
//!    flushes the player's final state.
//!
//! A fixed-tick scheduler in `server::core::GameServer` drives
//! `Engine::tick()` independently of connection I/O, per the
//! single-threaded-per-player / parallel-connection-I/O split.
//!
//! ## Configuration
//!
//! [`ServerConfig`] covers network binding, connection limits, the
//! session/auth knobs (`SESSION_SECRET`,
//! `TOKEN_EXPIRY`, `LOGIN_RATE_LIMIT`, `REGISTER_RATE_LIMIT`), and the
//! [`security::SecurityConfig`] input-validation thresholds.

// Re-export core types and functions for easy access
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::GameServer;
pub use utils::create_server;

// Public module declarations
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod security;
pub mod server;
pub mod session;
pub mod utils;

// Internal modules (not part of public API)
mod connection;

#[cfg(test)]
mod tests;

// Authentication integration tests
#[cfg(test)]
mod auth_integration_tests;
