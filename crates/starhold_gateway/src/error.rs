//! Transport-level error types for the gateway.
//!
//! This is deliberately a small, flat enum: anything that is a *game rule*
//! failure travels as [`starhold_core::GameError`] instead, reported to the
//! offending client. `ServerError` only covers failures in
//! standing the server itself up or keeping a socket alive.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Bind failures, accept-loop errors, WebSocket handshake failures.
    #[error("Network error: {0}")]
    Network(String),

    /// Fatal initialization failure (bad DB, port in use) — causes a
    /// non-zero process exit.
    #[error("Initialization error: {0}")]
    Init(String),

    /// Any other server-internal fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Network(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ServerError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ServerError::Network(e.to_string())
    }
}

impl From<starhold_persistence::StoreError> for ServerError {
    fn from(e: starhold_persistence::StoreError) -> Self {
        ServerError::Init(e.to_string())
    }
}
