//! Session lifecycle engine for the race matchmaking service
//!
//! This module holds the core of the system: the FIFO matchmaking queue,
//! the room state machine, ranking computation, deferred deadlines, and
//! the engine that orchestrates all of them.

pub mod engine;
pub mod queue;
pub mod ranking;
pub mod room;
pub mod timer;

// Re-export commonly used types
pub use engine::{EngineStats, SessionEngine};
pub use queue::MatchmakingQueue;
pub use room::{Room, RoomPhase, RuntimePlayer};
pub use timer::{TimeoutScheduler, TimerEvent};
