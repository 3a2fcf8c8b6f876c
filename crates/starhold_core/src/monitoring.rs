//! Health/status reporting (C10): uptime, connection count, and tick
//! timing for a single-process simulation with no replication layer to
//! report on.

use crate::types::current_timestamp_millis;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonically-updated counters a running server exposes at `/health`.
pub struct ServerMonitor {
    start_time: Instant,
    connections: AtomicU64,
    ticks_processed: AtomicU64,
    last_tick_duration_micros: AtomicU64,
}

impl ServerMonitor {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            connections: AtomicU64::new(0),
            ticks_processed: AtomicU64::new(0),
            last_tick_duration_micros: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self, duration: std::time::Duration) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
        self.last_tick_duration_micros
            .store(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn report(&self, shutting_down: bool) -> HealthReport {
        HealthReport {
            timestamp_millis: current_timestamp_millis(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            active_connections: self.connections.load(Ordering::Relaxed),
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            last_tick_duration_micros: self.last_tick_duration_micros.load(Ordering::Relaxed),
            shutting_down,
        }
    }
}

impl Default for ServerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Body served by the `/health` endpoint (C10's monitoring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp_millis: u64,
    pub uptime_seconds: u64,
    pub active_connections: u64,
    pub ticks_processed: u64,
    pub last_tick_duration_micros: u64,
    /// True once the server has begun graceful shutdown —
    /// a load balancer should stop routing new connections here.
    pub shutting_down: bool,
}

impl HealthReport {
    /// A tick consistently over budget is the one signal worth a boolean;
    /// everything else is fine-grained enough to leave to the operator
    /// reading the raw numbers. Draining counts as unhealthy regardless
    /// of tick timing.
    pub fn is_healthy(&self, tick_budget_micros: u64) -> bool {
        !self.shutting_down && self.last_tick_duration_micros <= tick_budget_micros
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_count_tracks_open_and_close() {
        let monitor = ServerMonitor::new();
        monitor.connection_opened();
        monitor.connection_opened();
        monitor.connection_closed();
        assert_eq!(monitor.report(false).active_connections, 1);
    }

    #[test]
    fn healthy_when_under_budget() {
        let monitor = ServerMonitor::new();
        monitor.record_tick(std::time::Duration::from_millis(10));
        assert!(monitor.report(false).is_healthy(50_000));
    }

    #[test]
    fn unhealthy_while_shutting_down_even_under_budget() {
        let monitor = ServerMonitor::new();
        monitor.record_tick(std::time::Duration::from_millis(10));
        assert!(!monitor.report(true).is_healthy(50_000));
    }
}
