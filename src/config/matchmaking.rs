//! Matchmaking tunables
//!
//! All constants that drive the queue matcher and the room state machine
//! live here so deployments can reshape session pacing without a rebuild.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Matchmaking and room lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Players dequeued per match attempt; a room is only formed when this
    /// many live players are available
    pub min_players_to_start: usize,
    /// Ready players required at the join deadline to force-start a room
    pub min_players_ready: usize,
    /// Seconds a room waits for its members to ready up after match found
    pub join_wait_seconds: u64,
    /// Countdown length broadcast to clients, in seconds
    pub countdown_seconds: u64,
    /// Maximum race length before the room is force-closed, in seconds
    pub race_duration_seconds: u64,
    /// Inclusive lower bound of the random map id range
    pub map_id_min: u32,
    /// Inclusive upper bound of the random map id range
    pub map_id_max: u32,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            min_players_to_start: 2,
            min_players_ready: 2,
            join_wait_seconds: 60,
            countdown_seconds: 10,
            race_duration_seconds: 120,
            map_id_min: 2,
            map_id_max: 4,
        }
    }
}

impl MatchmakingSettings {
    /// Get the join-timeout as a Duration
    pub fn join_wait(&self) -> Duration {
        Duration::from_secs(self.join_wait_seconds)
    }

    /// Get the race-timeout as a Duration
    pub fn race_duration(&self) -> Duration {
        Duration::from_secs(self.race_duration_seconds)
    }
}
