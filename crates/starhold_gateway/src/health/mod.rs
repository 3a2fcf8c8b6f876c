//! Health check endpoint backing (`/health`): wraps
//! [`starhold_core::monitoring::ServerMonitor`] with process memory and
//! circuit-breaker status, the only pieces a single-process simulation
//! server needs to report beyond what its raw uptime
//! checks don't cover.

use crate::server::GameServer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

pub mod circuit_breaker;

/// Health check manager for monitoring server status.
#[derive(Debug)]
pub struct HealthManager {
    last_health_check: Arc<RwLock<Option<HealthCheckResult>>>,
    circuit_breakers: Arc<RwLock<Vec<circuit_breaker::CircuitBreaker>>>,
}

/// Health check result containing system status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// `true` iff `status == Healthy`; the `{ok, uptimeSec}` shape named
    /// in spec.md's external-interfaces section, kept alongside the
    /// richer fields below rather than replacing them.
    pub ok: bool,
    pub status: HealthStatus,
    pub timestamp: u64,
    pub uptime_seconds: u64,
    /// Alias of `uptime_seconds` matching the `{status, uptime}` shape
    /// also named in spec.md; both aliases are populated so either
    /// documented client expectation is satisfied.
    pub uptime: u64,
    pub memory_usage_mb: u64,
    pub active_connections: u64,
    pub ticks_processed: u64,
    pub last_tick_duration_micros: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Overall health status of the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A tick running over budget for a sustained period is the one
/// condition that degrades this server's health; everything else
/// (memory, circuit breakers) is a secondary signal.
const TICK_BUDGET_MICROS: u64 = 50_000;

impl HealthManager {
    pub fn new() -> Self {
        Self {
            last_health_check: Arc::new(RwLock::new(None)),
            circuit_breakers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Performs a comprehensive health check of the server.
    pub async fn perform_health_check(&self, server: &GameServer) -> HealthCheckResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let report = server.monitor.report(server.shutdown.is_shutdown_initiated());
        let memory_usage_mb = self.get_memory_usage().await;

        if report.shutting_down {
            errors.push("server is draining connections for shutdown".to_string());
        } else if report.last_tick_duration_micros > TICK_BUDGET_MICROS {
            warnings.push(format!(
                "last tick took {}us, over the {}us budget",
                report.last_tick_duration_micros, TICK_BUDGET_MICROS
            ));
        }

        if memory_usage_mb > 1024 {
            warnings.push(format!("high memory usage: {memory_usage_mb}MB"));
        }
        if memory_usage_mb > 2048 {
            errors.push(format!("critical memory usage: {memory_usage_mb}MB"));
        }

        let circuit_breakers = self.circuit_breakers.read().await;
        for cb in circuit_breakers.iter() {
            if cb.is_open().await {
                errors.push(format!("circuit breaker '{}' is open", cb.name()));
            }
        }
        drop(circuit_breakers);

        let status = if !errors.is_empty() {
            HealthStatus::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let result = HealthCheckResult {
            ok: status == HealthStatus::Healthy,
            status,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_seconds: report.uptime_seconds,
            uptime: report.uptime_seconds,
            memory_usage_mb,
            active_connections: report.active_connections,
            ticks_processed: report.ticks_processed,
            last_tick_duration_micros: report.last_tick_duration_micros,
            errors,
            warnings,
        };

        *self.last_health_check.write().await = Some(result.clone());
        result
    }

    pub async fn get_last_health_check(&self) -> Option<HealthCheckResult> {
        self.last_health_check.read().await.clone()
    }

    /// Minimal-overhead liveness check: the process can execute this code.
    pub async fn liveness_check(&self) -> bool {
        true
    }

    /// Readiness requires at least one completed tick: until then the
    /// simulation hasn't finished its first pass over world state.
    pub async fn readiness_check(&self, server: &GameServer) -> bool {
        !server.shutdown.is_shutdown_initiated() && server.monitor.report(false).ticks_processed > 0
    }

    async fn get_memory_usage(&self) -> u64 {
        #[cfg(target_os = "linux")]
        {
            self.get_linux_memory_usage().await
        }
        #[cfg(not(target_os = "linux"))]
        {
            0
        }
    }

    #[cfg(target_os = "linux")]
    async fn get_linux_memory_usage(&self) -> u64 {
        use std::fs;

        if let Ok(status) = fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<u64>() {
                            return kb / 1024;
                        }
                    }
                    break;
                }
            }
        }
        0
    }

    pub async fn add_circuit_breaker(&self, circuit_breaker: circuit_breaker::CircuitBreaker) {
        self.circuit_breakers.write().await.push(circuit_breaker);
    }

    /// Health metrics in Prometheus exposition format.
    pub async fn get_prometheus_metrics(&self, server: &GameServer) -> String {
        let health_check = self.perform_health_check(server).await;
        let status_value = match health_check.status {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unhealthy => 0.0,
        };

        format!(
            "# HELP starhold_server_health Overall server health status\n\
             # TYPE starhold_server_health gauge\n\
             starhold_server_health {}\n\
             # HELP starhold_server_uptime_seconds Server uptime in seconds\n\
             # TYPE starhold_server_uptime_seconds counter\n\
             starhold_server_uptime_seconds {}\n\
             # HELP starhold_server_memory_usage_mb Memory usage in megabytes\n\
             # TYPE starhold_server_memory_usage_mb gauge\n\
             starhold_server_memory_usage_mb {}\n\
             # HELP starhold_server_active_connections Active client connections\n\
             # TYPE starhold_server_active_connections gauge\n\
             starhold_server_active_connections {}\n\
             # HELP starhold_server_ticks_processed Total simulation ticks processed\n\
             # TYPE starhold_server_ticks_processed counter\n\
             starhold_server_ticks_processed {}\n",
            status_value,
            health_check.uptime_seconds,
            health_check.memory_usage_mb,
            health_check.active_connections,
            health_check.ticks_processed,
        )
    }
}

impl Default for HealthManager {
    fn default() -> Self {
        Self::new()
    }
}
