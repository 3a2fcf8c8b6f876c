//! Signal handling for graceful server shutdown.
//!
//! Cross-platform: SIGINT/SIGTERM on Unix, Ctrl+C on Windows. The returned
//! future is passed directly as `starhold_gateway::GameServer::run`'s
//! shutdown trigger, which owns its own `ShutdownState` internally.

use tokio::signal;
use tracing::info;

/// Resolves once a termination signal is received.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }

    info!("received shutdown signal - initiating graceful shutdown");
}
