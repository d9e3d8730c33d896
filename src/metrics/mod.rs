//! Metrics collection for the race session service
//!
//! Prometheus counters and gauges for queue, room, and race activity,
//! exposed at the `/metrics` endpoint.

pub mod collector;

// Re-export commonly used types
pub use collector::MetricsCollector;
