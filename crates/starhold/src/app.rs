//! Application lifecycle: load config, build a [`GameServer`], run it to
//! completion.

use crate::cli::CliArgs;
use crate::signals::wait_for_shutdown_signal;
use starhold_gateway::{create_server, GameServer, ServerConfig};
use std::sync::Arc;
use tracing::info;

pub struct Application {
    config: ServerConfig,
    server: Arc<GameServer>,
}

impl Application {
    /// Loads configuration and connects the server to its backing store.
    /// A database connection failure here is fatal (non-zero
    /// exit on init failure).
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let config = crate::config::load(&args)?;
        info!(bind = %config.bind_address, health = %config.health_bind_address, "configuration loaded");

        let server = create_server(config.clone()).await?;
        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// Runs the accept loop, tick loop, health endpoint and session sweep
    /// until a shutdown signal arrives, then drains connections.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            max_connections = self.config.max_connections,
            tick_ms = self.config.tick_interval_ms,
            "starting server"
        );

        self.server.run(wait_for_shutdown_signal()).await?;

        info!("shutdown complete");
        Ok(())
    }
}
