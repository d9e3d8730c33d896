//! Prometheus metrics collector

use crate::error::{Result, SessionError};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Collector owning the service's Prometheus registry and instruments
#[derive(Debug)]
pub struct MetricsCollector {
    registry: Registry,
    /// Currently connected players
    pub connected_players: IntGauge,
    /// Currently live rooms
    pub active_rooms: IntGauge,
    /// Players enqueued since service start
    pub players_queued_total: IntCounter,
    /// Rooms created since service start
    pub rooms_created_total: IntCounter,
    /// Countdowns started since service start
    pub races_started_total: IntCounter,
    /// Races completed by all members finishing
    pub races_completed_total: IntCounter,
    /// Races force-closed by the race deadline
    pub races_timed_out_total: IntCounter,
    /// Rooms torn down for lack of ready players
    pub matches_failed_total: IntCounter,
}

impl MetricsCollector {
    /// Create a collector with all instruments registered
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Self::build()?;

        registry
            .register(Box::new(collector.connected_players.clone()))
            .and_then(|_| registry.register(Box::new(collector.active_rooms.clone())))
            .and_then(|_| registry.register(Box::new(collector.players_queued_total.clone())))
            .and_then(|_| registry.register(Box::new(collector.rooms_created_total.clone())))
            .and_then(|_| registry.register(Box::new(collector.races_started_total.clone())))
            .and_then(|_| registry.register(Box::new(collector.races_completed_total.clone())))
            .and_then(|_| registry.register(Box::new(collector.races_timed_out_total.clone())))
            .and_then(|_| registry.register(Box::new(collector.matches_failed_total.clone())))
            .map_err(|e| SessionError::InternalError {
                message: format!("Failed to register metrics: {}", e),
            })?;

        Ok(Self {
            registry,
            ..collector
        })
    }

    fn build() -> Result<Self> {
        let gauge = |name: &str, help: &str| {
            IntGauge::new(name, help).map_err(|e| SessionError::InternalError {
                message: format!("Failed to create gauge {}: {}", name, e),
            })
        };
        let counter = |name: &str, help: &str| {
            IntCounter::new(name, help).map_err(|e| SessionError::InternalError {
                message: format!("Failed to create counter {}: {}", name, e),
            })
        };

        Ok(Self {
            registry: Registry::new(),
            connected_players: gauge(
                "paddock_connected_players",
                "Number of currently connected players",
            )?,
            active_rooms: gauge("paddock_active_rooms", "Number of live rooms")?,
            players_queued_total: counter(
                "paddock_players_queued_total",
                "Players enqueued since service start",
            )?,
            rooms_created_total: counter(
                "paddock_rooms_created_total",
                "Rooms created since service start",
            )?,
            races_started_total: counter(
                "paddock_races_started_total",
                "Countdowns started since service start",
            )?,
            races_completed_total: counter(
                "paddock_races_completed_total",
                "Races where every member finished",
            )?,
            races_timed_out_total: counter(
                "paddock_races_timed_out_total",
                "Races force-closed by the race deadline",
            )?,
            matches_failed_total: counter(
                "paddock_matches_failed_total",
                "Rooms torn down for lack of ready players",
            )?,
        })
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| SessionError::InternalError {
                message: format!("Failed to encode metrics: {}", e),
            })?;

        String::from_utf8(buffer).map_err(|e| {
            SessionError::InternalError {
                message: format!("Metrics output was not valid UTF-8: {}", e),
            }
            .into()
        })
    }
}

impl Default for MetricsCollector {
    /// Unregistered instruments; used when a registry is not needed (tests)
    /// or as a fallback when registration fails.
    fn default() -> Self {
        Self::build().expect("metric construction cannot fail with static names")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_and_gathers() {
        let collector = MetricsCollector::new().unwrap();
        collector.connected_players.set(3);
        collector.rooms_created_total.inc();

        let output = collector.gather().unwrap();
        assert!(output.contains("paddock_connected_players 3"));
        assert!(output.contains("paddock_rooms_created_total 1"));
    }

    #[test]
    fn test_default_collector_is_usable() {
        let collector = MetricsCollector::default();
        collector.active_rooms.set(1);
        assert_eq!(collector.active_rooms.get(), 1);
    }
}
