//! Service coordination for the paddock race session service
//!
//! This module contains the production AppState that wires together the
//! engine, registry, scheduler, and HTTP/WebSocket server, plus health
//! check reporting.

pub mod app;
pub mod health;

// Re-export commonly used types
pub use app::AppState;
pub use health::{HealthCheck, HealthStatus, ServiceStats};
