//! The command-handling error taxonomy. One enum shared by
//! the gateway and the simulation engine so a mining/wormhole/market
//! failure inside the tick loop and a malformed-payload failure inside
//! the connection router report through the same shape.

use thiserror::Error;

/// Errors a command handler can produce. Variants are chosen by how they
/// must be handled, not by subsystem: `GameError::State` covers "not near
/// enough" and "cargo full" alike because both are reported the same way
/// (a typed `*:error` response to the offending client, never broadcast).
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid credentials, rate limited, expired/missing token.
    #[error("{0}")]
    Auth(String),

    /// Malformed payload, out-of-range numeric, unknown enum value.
    #[error("{0}")]
    Validation(String),

    /// Wrong phase, not near enough, cargo full, insufficient credits,
    /// depleted resource, duplicate session.
    #[error("{0}")]
    State(String),

    /// Transaction conflict or IO failure at the persistence boundary.
    /// Retriable within the tick; becomes a generic failure once retries
    /// are exhausted.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Unknown event name or an event unexpected in the connection's
    /// current state. This is logged and ignored — no
    /// response — so callers should not forward this variant to the
    /// client directly.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Any uncaught fault inside a handler. Logged with context; the
    /// client receives a generic failure message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// The stable, UI-facing string for this error. These
    /// strings are part of the wire contract and must not be reworded
    /// carelessly (e.g. `"Cargo hold full"`, `"Listing not found"`).
    pub fn client_message(&self) -> String {
        match self {
            GameError::Auth(m)
            | GameError::Validation(m)
            | GameError::State(m) => m.clone(),
            GameError::Persistence(_) => "Something went wrong, please try again".to_string(),
            GameError::Protocol(_) => String::new(),
            GameError::Internal(_) => "Something went wrong, please try again".to_string(),
        }
    }

    /// Protocol errors are logged and silently dropped rather than
    /// answered, to avoid giving an attacker a reliable oracle.
    pub fn is_silent(&self) -> bool {
        matches!(self, GameError::Protocol(_))
    }
}

pub type GameResult<T> = Result<T, GameError>;
