//! Paddock - matchmaking service for timed multiplayer races
//!
//! This crate provides WebSocket-based matchmaking with room lifecycle
//! management, a ready-up handshake, synchronized countdowns, and live
//! race rankings.

pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;
pub mod ws;

// Re-export commonly used types and traits
pub use error::{Result, SessionError};
pub use types::*;

// Re-export key components
pub use session::{MatchmakingQueue, Room, SessionEngine, TimeoutScheduler};
pub use ws::{ConnectionHandle, ConnectionRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
