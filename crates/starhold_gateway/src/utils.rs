//! Factory helper for building a [`GameServer`] from configuration.

use crate::{config::ServerConfig, error::ServerError, server::GameServer};

/// Builds a server from `config`, connecting to Postgres in the process.
/// Fails with [`ServerError::Init`] if the database is unreachable.
pub async fn create_server(config: ServerConfig) -> Result<GameServer, ServerError> {
    GameServer::new(config).await
}