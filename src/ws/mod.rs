//! WebSocket transport for the race session service
//!
//! This module handles connection acceptance, the JSON wire protocol, and
//! the per-player connection registry. The session engine itself never
//! touches sockets; it sends through [`ConnectionHandle`]s handed out here.

pub mod messages;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use messages::{ClientMessage, RankingEntry, ServerEvent};
pub use registry::{ConnectionHandle, ConnectionRegistry, OutboundFrame};
pub use server::{router, ServerState};
