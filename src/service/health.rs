//! Health check reporting
//!
//! This module provides health check functionality for the paddock race
//! session service, surfaced on the `/health` endpoint and the
//! `--health-check` CLI mode.

use crate::session::engine::SessionEngine;
use crate::ws::registry::ConnectionRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Number of live rooms
    pub active_rooms: usize,
    /// Players currently waiting in the queue
    pub players_waiting: usize,
    /// Currently connected players
    pub connected_players: usize,
    /// Countdowns started since service start
    pub races_started: u64,
    /// Races where every member finished
    pub races_completed: u64,
    /// Service uptime in seconds
    pub uptime_seconds: i64,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Service statistics
    pub stats: ServiceStats,
}

impl HealthCheck {
    /// Snapshot the current service health
    pub fn snapshot(
        engine: &SessionEngine,
        registry: &ConnectionRegistry,
        service_name: &str,
        started_at: DateTime<Utc>,
        is_running: bool,
    ) -> Self {
        let engine_stats = engine.stats();
        let now = Utc::now();

        let status = if is_running {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        Self {
            status,
            service: service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: now,
            stats: ServiceStats {
                active_rooms: engine_stats.active_rooms,
                players_waiting: engine_stats.players_waiting,
                connected_players: registry.connection_count(),
                races_started: engine_stats.races_started,
                races_completed: engine_stats.races_completed,
                uptime_seconds: (now - started_at).num_seconds(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::metrics::MetricsCollector;
    use crate::session::timer::TimeoutScheduler;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_snapshot_reports_running_service() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (scheduler, _events) = TimeoutScheduler::channel();
        let engine = SessionEngine::new(
            registry.clone(),
            MatchmakingSettings::default(),
            scheduler,
            Arc::new(MetricsCollector::default()),
        );

        let check = HealthCheck::snapshot(&engine, &registry, "paddock", Utc::now(), true);
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.service, "paddock");
        assert_eq!(check.stats.active_rooms, 0);
        assert_eq!(check.stats.connected_players, 0);

        let stopped = HealthCheck::snapshot(&engine, &registry, "paddock", Utc::now(), false);
        assert_eq!(stopped.status, HealthStatus::Unhealthy);
    }
}
