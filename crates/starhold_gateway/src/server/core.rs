//! The game server process (C5/C6 wiring): owns the simulation engine,
//! the connection table, and the two network listeners — the WebSocket
//! gateway and the `/health` HTTP endpoint.
//! Built around a direct `starhold_sim::Engine` handle
//! since this server has exactly one kind of work to drive: the simulation.

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::connection::ConnectionManager;
use crate::error::ServerError;
use crate::health::HealthManager;
use crate::security::SecurityManager;
use crate::server::handlers;
use crate::session::SessionManager;
use starhold_core::protocol::Envelope;
use starhold_core::{ServerMonitor, ShutdownState};
use starhold_persistence::Store;
use starhold_sim::{Engine, Outbound};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

/// The running game server: one process, one world, one tick loop.
pub struct GameServer {
    pub config: ServerConfig,
    pub engine: Arc<Engine>,
    pub connections: Arc<ConnectionManager>,
    pub sessions: Arc<SessionManager>,
    pub auth: Arc<AuthService>,
    pub security: Arc<SecurityManager>,
    pub monitor: Arc<ServerMonitor>,
    pub health: Arc<HealthManager>,
    pub shutdown: ShutdownState,
}

impl GameServer {
    /// Connects to Postgres and builds a server ready to `run()`.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Store::connect(&config.database_url).await?;
        let engine = Arc::new(Engine::new(config.galaxy_seed, store));
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(config.token_expiry_secs)));
        let auth = Arc::new(AuthService::new(&config));
        let security = Arc::new(SecurityManager::new(config.security.clone()));

        Ok(Self {
            config,
            engine,
            connections: Arc::new(ConnectionManager::new()),
            sessions,
            auth,
            security,
            monitor: Arc::new(ServerMonitor::new()),
            health: Arc::new(HealthManager::new()),
            shutdown: ShutdownState::new(),
        })
    }

    /// Runs the WebSocket accept loop, the fixed-tick scheduler, and the
    /// `/health` HTTP server concurrently until `shutdown_signal` resolves.
    pub async fn run(self: Arc<Self>, shutdown_signal: impl std::future::Future<Output = ()>) -> Result<(), ServerError> {
        let accept_handle = tokio::spawn(self.clone().accept_loop());
        let tick_handle = tokio::spawn(self.clone().tick_loop());
        let health_handle = tokio::spawn(self.clone().health_server());
        let session_sweep_handle = tokio::spawn(self.clone().session_sweep_loop());

        shutdown_signal.await;
        self.shutdown.initiate_shutdown();

        accept_handle.abort();
        tick_handle.abort();
        health_handle.abort();
        session_sweep_handle.abort();

        self.drain_connections().await;
        self.shutdown.complete_shutdown();
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>) {
        let listener = match TcpListener::bind(self.config.bind_address).await {
            Ok(l) => l,
            Err(e) => {
                error!("failed to bind {}: {e}", self.config.bind_address);
                return;
            }
        };
        info!("gateway listening on {}", self.config.bind_address);

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            if self.shutdown.is_shutdown_initiated() {
                break;
            }
            if self.connections.connection_count() >= self.config.max_connections {
                warn!(%addr, "rejecting connection: at max_connections");
                continue;
            }
            if let Err(e) = self.security.validate_connection(addr.ip()).await {
                warn!(%addr, "connection rejected: {e}");
                continue;
            }

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = handlers::handle_connection(stream, addr, server.clone()).await {
                    warn!(%addr, "connection ended with error: {e}");
                }
                server.security.on_disconnect(addr.ip()).await;
            });
        }
    }

    /// Drives `Engine::tick()` at `config.tick_interval_ms`, independent
    /// of connection I/O.
    async fn tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.shutdown.is_shutdown_initiated() {
                break;
            }
            let started = std::time::Instant::now();
            let outbound = self.engine.tick().await;
            self.monitor.record_tick(started.elapsed());
            for item in outbound {
                self.deliver_outbound(item);
            }
        }
    }

    /// Purges expired bearer tokens on a slow interval (
    /// "a background sweep purges expired tokens"), independent of the
    /// per-read expiry refresh `SessionManager::validate` already does.
    async fn session_sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if self.shutdown.is_shutdown_initiated() {
                break;
            }
            let purged = self.sessions.sweep_expired();
            if purged > 0 {
                info!(purged, "swept expired sessions");
            }
        }
    }

    async fn health_server(self: Arc<Self>) {
        use axum::extract::State;
        use axum::routing::get;
        use axum::{Json, Router};
        use crate::health::HealthCheckResult;

        async fn health_handler(State(server): State<Arc<GameServer>>) -> Json<HealthCheckResult> {
            Json(server.health.perform_health_check(&server).await)
        }

        async fn metrics_handler(State(server): State<Arc<GameServer>>) -> String {
            server.health.get_prometheus_metrics(&server).await
        }

        async fn liveness_handler(State(server): State<Arc<GameServer>>) -> &'static str {
            if server.health.liveness_check().await {
                "ok"
            } else {
                "unavailable"
            }
        }

        async fn readiness_handler(State(server): State<Arc<GameServer>>) -> &'static str {
            if server.health.readiness_check(&server).await {
                "ready"
            } else {
                "not ready"
            }
        }

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.clone());

        let listener = match TcpListener::bind(self.config.health_bind_address).await {
            Ok(l) => l,
            Err(e) => {
                error!("failed to bind health endpoint {}: {e}", self.config.health_bind_address);
                return;
            }
        };
        info!("health endpoint listening on {}", self.config.health_bind_address);
        if let Err(e) = axum::serve(listener, app).await {
            error!("health server error: {e}");
        }
    }

    /// Translates one simulation [`Outbound`] into a serialized envelope
    /// delivered to the right connection(s). Drops silently if the target
    /// isn't currently connected or its outbound queue is full — the
    /// engine does not need delivery confirmation.
    pub fn deliver_outbound(&self, outbound: Outbound) {
        match outbound {
            Outbound::ToUser(user_id, envelope) => {
                self.send_to_user(user_id, &envelope);
            }
            Outbound::ToUsers(user_ids, envelope) => {
                for user_id in user_ids {
                    self.send_to_user(user_id, &envelope);
                }
            }
            Outbound::Broadcast(envelope) => {
                if let Ok(text) = serde_json::to_string(&envelope) {
                    for connection_id in self.connections.all_connection_ids() {
                        self.connections.try_send(connection_id, Message::Text(text.clone().into()));
                    }
                }
            }
        }
    }

    fn send_to_user(&self, user_id: starhold_core::UserId, envelope: &Envelope) {
        if let Ok(text) = serde_json::to_string(envelope) {
            self.connections.try_send_to_user(user_id, Message::Text(text.into()));
        }
    }

    /// On shutdown, tells every currently-authenticated connection's
    /// player to flush its final state, as part of graceful
    /// shutdown requirement.
    async fn drain_connections(&self) {
        for connection_id in self.connections.all_connection_ids() {
            if let Some(user_id) = self.connections.user_of(connection_id) {
                for outbound in self.engine.disconnect(user_id).await {
                    self.deliver_outbound(outbound);
                }
            }
        }
    }
}
