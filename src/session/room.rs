//! Room instance and lifecycle state
//!
//! A room groups matched players sharing one countdown/race timeline.
//! Membership is fixed at creation, except that not-ready members may be
//! evicted exactly once at the join deadline. Phase is derived from the
//! countdown fields rather than stored separately.

use crate::types::{Player, PlayerId, RoomId};
use crate::utils::{current_timestamp, epoch_seconds, millis_between};
use crate::ws::messages::ServerEvent;
use crate::ws::registry::ConnectionHandle;
use chrono::{DateTime, Utc};

/// Derived lifecycle phase of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Created, waiting for ready signals
    Waiting,
    /// Countdown broadcast, race not yet underway
    CountingDown,
    /// Countdown deadline passed, clients are racing
    Racing,
}

/// A player's live session state within a room
#[derive(Debug, Clone)]
pub struct RuntimePlayer {
    pub player: Player,
    /// Non-owning reference into the connection registry
    pub connection: ConnectionHandle,
    pub is_ready: bool,
    pub race_start_time: Option<DateTime<Utc>>,
    pub race_finish_time: Option<DateTime<Utc>>,
    /// Completion time in milliseconds, finish minus start
    pub race_duration_ms: Option<i64>,
}

impl RuntimePlayer {
    /// Wrap a player identity and its connection for a session
    pub fn new(player: Player, connection: ConnectionHandle) -> Self {
        Self {
            player,
            connection,
            is_ready: false,
            race_start_time: None,
            race_finish_time: None,
            race_duration_ms: None,
        }
    }

    /// The player's id
    pub fn id(&self) -> &str {
        &self.player.id
    }

    /// Whether a finish has been recorded for this player
    pub fn has_finished(&self) -> bool {
        self.race_finish_time.is_some()
    }
}

/// One match: a bounded-lifetime session of racing players
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    pub players: Vec<RuntimePlayer>,
    pub is_countdown_started: bool,
    /// Countdown start, whole seconds since epoch
    pub countdown_start_time: Option<i64>,
    /// Countdown deadline, whole seconds since epoch; immutable once set
    pub countdown_end_time: Option<i64>,
    /// Millisecond instant of countdown start, the race-duration baseline
    pub countdown_started_at: Option<DateTime<Utc>>,
    pub match_found_timestamp: DateTime<Utc>,
    /// Finish order; a player appears at most once
    pub finished_players: Vec<PlayerId>,
    /// Race length broadcast to clients and used for the race deadline
    pub race_duration_secs: u64,
}

impl Room {
    /// Create a room for freshly matched players
    pub fn new(id: RoomId, players: Vec<RuntimePlayer>, race_duration_secs: u64) -> Self {
        Self {
            id,
            players,
            is_countdown_started: false,
            countdown_start_time: None,
            countdown_end_time: None,
            countdown_started_at: None,
            match_found_timestamp: current_timestamp(),
            finished_players: Vec::new(),
            race_duration_secs,
        }
    }

    /// Room ID
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Derived lifecycle phase
    pub fn phase(&self) -> RoomPhase {
        if !self.is_countdown_started {
            return RoomPhase::Waiting;
        }
        match self.countdown_end_time {
            Some(end) if epoch_seconds(current_timestamp()) >= end => RoomPhase::Racing,
            _ => RoomPhase::CountingDown,
        }
    }

    /// Whether the given player is a member
    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id() == player_id)
    }

    /// Member lookup
    pub fn player(&self, player_id: &str) -> Option<&RuntimePlayer> {
        self.players.iter().find(|p| p.id() == player_id)
    }

    /// Mutable member lookup
    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut RuntimePlayer> {
        self.players.iter_mut().find(|p| p.id() == player_id)
    }

    /// Whether every current member has readied up
    pub fn all_ready(&self) -> bool {
        self.players.iter().all(|p| p.is_ready)
    }

    /// Number of ready members
    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_ready).count()
    }

    /// Flip the countdown latch and stamp the timing fields.
    ///
    /// Returns false when the countdown already started; the fields are
    /// then left untouched.
    pub fn begin_countdown(&mut self, now: DateTime<Utc>, countdown_seconds: u64) -> bool {
        if self.is_countdown_started {
            return false;
        }

        let start = epoch_seconds(now);
        self.is_countdown_started = true;
        self.countdown_started_at = Some(now);
        self.countdown_start_time = Some(start);
        self.countdown_end_time = Some(start + countdown_seconds as i64);
        true
    }

    /// Record a finish report. Idempotent per player: a second report
    /// returns false and changes nothing.
    pub fn record_finish(&mut self, player_id: &str, now: DateTime<Utc>) -> bool {
        let Some(player) = self.player_mut(player_id) else {
            return false;
        };
        if player.has_finished() {
            return false;
        }

        player.race_finish_time = Some(now);
        if let Some(start) = player.race_start_time {
            player.race_duration_ms = Some(millis_between(start, now));
        }

        let id = player.id().to_string();
        self.finished_players.push(id);
        true
    }

    /// Whether the given player already finished
    pub fn has_finished(&self, player_id: &str) -> bool {
        self.finished_players.iter().any(|id| id == player_id)
    }

    /// Whether every member has finished
    pub fn is_complete(&self) -> bool {
        self.finished_players.len() == self.players.len()
    }

    /// Send an event to every member whose connection is still live
    pub fn broadcast(&self, event: &ServerEvent) {
        for player in &self.players {
            if player.connection.is_open() {
                player.connection.send(event);
            }
        }
    }
}
