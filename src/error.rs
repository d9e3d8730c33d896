//! Error types for the race session service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific session scenarios
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid client message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Player already queued: {player_id}")]
    PlayerAlreadyQueued { player_id: String },

    #[error("Connection closed: {player_id}")]
    ConnectionClosed { player_id: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
