//! Session engine: queue, room directory, and all state transitions
//!
//! The engine exclusively owns the matchmaking queue and the room
//! directory. WebSocket message handling and timer dispatch both funnel
//! into methods here and serialize on one lock, so queue and room state
//! is never mutated concurrently. No method blocks or awaits: outbound
//! traffic is fire-and-forget through connection handles.

use crate::config::MatchmakingSettings;
use crate::error::{Result, SessionError};
use crate::metrics::MetricsCollector;
use crate::session::queue::MatchmakingQueue;
use crate::session::ranking::{compute_rankings, rank_of};
use crate::session::room::{Room, RuntimePlayer};
use crate::session::timer::{TimeoutScheduler, TimerEvent};
use crate::types::{Player, RoomId};
use crate::utils::{current_timestamp, epoch_seconds, generate_room_id};
use crate::ws::messages::{
    ClientMessage, ServerEvent, CLOSE_NORMAL, MATCH_FAILED_NOTICE, NOT_READY_CLOSE_REASON,
    QUEUE_GREETING, RACE_TIMEOUT_NOTICE,
};
use crate::ws::registry::{ConnectionHandle, ConnectionRegistry};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Snapshot of engine activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Total number of players enqueued
    pub players_queued: u64,
    /// Total number of rooms created
    pub rooms_created: u64,
    /// Total number of countdowns started
    pub races_started: u64,
    /// Races where every member finished
    pub races_completed: u64,
    /// Races force-closed by the race deadline
    pub races_timed_out: u64,
    /// Rooms torn down for lack of ready players
    pub matches_failed: u64,
    /// Current number of live rooms
    pub active_rooms: usize,
    /// Current number of players waiting in the queue
    pub players_waiting: usize,
}

/// Queue and directory, guarded together so a match attempt sees both
#[derive(Debug, Default)]
struct EngineState {
    queue: MatchmakingQueue,
    rooms: HashMap<RoomId, Room>,
}

/// The session engine
pub struct SessionEngine {
    state: Mutex<EngineState>,
    registry: Arc<ConnectionRegistry>,
    settings: MatchmakingSettings,
    scheduler: TimeoutScheduler,
    metrics: Arc<MetricsCollector>,
    counters: Mutex<EngineStats>,
}

impl SessionEngine {
    /// Create a new engine
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        settings: MatchmakingSettings,
        scheduler: TimeoutScheduler,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            registry,
            settings,
            scheduler,
            metrics,
            counters: Mutex::new(EngineStats::default()),
        }
    }

    /// Spawn the dispatcher that serializes fired deadlines into the engine
    pub fn start(self: &Arc<Self>, mut events: UnboundedReceiver<TimerEvent>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let result = match event {
                    TimerEvent::JoinDeadline(room_id) => engine.handle_join_timeout(room_id),
                    TimerEvent::RaceDeadline(room_id) => engine.handle_race_timeout(room_id),
                };
                if let Err(e) = result {
                    error!("Failed to handle {:?}: {}", event, e);
                }
            }
            debug!("Timer dispatcher stopped");
        })
    }

    /// Track a new connection and enqueue its player for matchmaking
    pub fn register_player(&self, player_id: &str, handle: ConnectionHandle) -> Result<()> {
        self.registry.register(handle.clone())?;
        self.metrics
            .connected_players
            .set(self.registry.connection_count() as i64);

        let mut state = self.lock_state()?;
        state
            .queue
            .enqueue(RuntimePlayer::new(Player::unassigned(player_id), handle.clone()))?;

        info!(
            "Player {} added to queue. Current queue size: {}",
            player_id,
            state.queue.len()
        );
        self.bump(|c| c.players_queued += 1);
        self.metrics.players_queued_total.inc();

        handle.send(&ServerEvent::InQueue {
            message: QUEUE_GREETING.to_string(),
        });

        self.try_match(&mut state)
    }

    /// Handle one raw text frame from a player
    pub fn handle_message(&self, player_id: &str, raw: &str) -> Result<()> {
        let message = ClientMessage::parse(raw)?;
        debug!("Message from {}: {:?}", player_id, message);

        match message {
            ClientMessage::Ready => self.handle_ready(player_id),
            ClientMessage::Finish => self.handle_finish(player_id),
            // Unknown message types are silently ignored
            ClientMessage::Other => Ok(()),
        }
    }

    /// A player signalled readiness
    pub fn handle_ready(&self, player_id: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(room) = state.rooms.values_mut().find(|r| r.contains(player_id)) else {
            info!("Ready signal from player {} who is in no room", player_id);
            return Ok(());
        };

        if let Some(player) = room.player_mut(player_id) {
            player.is_ready = true;
        }
        info!("Player {} is now ready in room {}", player_id, room.id());

        if room.is_countdown_started {
            // Late ready: re-send the original deadline, never extend it.
            self.resend_countdown(room);
            return Ok(());
        }

        if room.all_ready() {
            info!(
                "All players in room {} are ready. Starting countdown.",
                room.id()
            );
            self.start_countdown(room);
        }

        Ok(())
    }

    /// A player reported crossing the finish line
    pub fn handle_finish(&self, player_id: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(room) = state.rooms.values_mut().find(|r| r.contains(player_id)) else {
            info!("Finish report from player {} who is in no room", player_id);
            return Ok(());
        };

        if !room.record_finish(player_id, current_timestamp()) {
            debug!("Ignoring duplicate finish report from {}", player_id);
            return Ok(());
        }

        let duration = room.player(player_id).and_then(|p| p.race_duration_ms);
        info!(
            "Player {} finished race in room {} ({:?} ms)",
            player_id,
            room.id(),
            duration
        );

        let rankings = compute_rankings(room);
        let rank = rank_of(&rankings, player_id).unwrap_or(rankings.len() as u32);
        room.broadcast(&ServerEvent::FinishRanking {
            rank,
            player_id: player_id.to_string(),
            duration,
        });

        if room.is_complete() {
            let room_id = room.id();
            info!("Race in room {} is finished. Final ranking sent.", room_id);
            room.broadcast(&ServerEvent::RaceRanking { rankings });

            state.rooms.remove(&room_id);
            self.bump(|c| c.races_completed += 1);
            self.metrics.races_completed_total.inc();
            self.metrics.active_rooms.set(state.rooms.len() as i64);
        }

        Ok(())
    }

    /// Connection lost: forget the handle and dequeue if still waiting.
    ///
    /// Room membership is untouched; broadcasts skip closed handles and
    /// the timeout paths sweep dead members.
    pub fn handle_disconnect(&self, player_id: &str) -> Result<()> {
        info!("Closing connection state for player {}", player_id);
        if let Some(handle) = self.registry.remove(player_id)? {
            handle.mark_closed();
        }
        self.metrics
            .connected_players
            .set(self.registry.connection_count() as i64);

        let mut state = self.lock_state()?;
        if state.queue.remove(player_id).is_some() {
            info!("Removed disconnected player {} from the queue", player_id);
        }

        Ok(())
    }

    /// Join deadline fired for a room.
    ///
    /// Directory absence or an already-started countdown mean the deadline
    /// was overtaken by events; both are no-ops.
    pub fn handle_join_timeout(&self, room_id: RoomId) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(room) = state.rooms.get_mut(&room_id) else {
            debug!("Join deadline for room {} which is already gone", room_id);
            return Ok(());
        };
        if room.is_countdown_started {
            return Ok(());
        }

        let ready = room.ready_count();
        if ready >= self.settings.min_players_ready {
            let evicted = room.players.len() - ready;
            info!(
                "Join deadline for room {}: {} ready (min {}). Evicting {} not-ready players and starting countdown.",
                room_id, ready, self.settings.min_players_ready, evicted
            );

            for player in room.players.iter().filter(|p| !p.is_ready) {
                if player.connection.is_open() {
                    player.connection.close(CLOSE_NORMAL, NOT_READY_CLOSE_REASON);
                }
            }
            room.players.retain(|p| p.is_ready);
            self.start_countdown(room);
        } else {
            warn!(
                "Room {} failed to start: only {} of {} players readied up",
                room_id,
                ready,
                room.players.len()
            );
            room.broadcast(&ServerEvent::MatchFailed {
                message: MATCH_FAILED_NOTICE.to_string(),
            });

            state.rooms.remove(&room_id);
            self.bump(|c| c.matches_failed += 1);
            self.metrics.matches_failed_total.inc();
            self.metrics.active_rooms.set(state.rooms.len() as i64);
        }

        Ok(())
    }

    /// Race deadline fired for a room; force-conclude it if still live
    pub fn handle_race_timeout(&self, room_id: RoomId) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(room) = state.rooms.get_mut(&room_id) else {
            debug!("Race deadline for room {} which is already gone", room_id);
            return Ok(());
        };

        info!("Race in room {} timed out. Cleaning up.", room_id);
        let notice = ServerEvent::RaceTimeout {
            message: RACE_TIMEOUT_NOTICE.to_string(),
        };
        for player in &room.players {
            if player.connection.is_open() && !room.has_finished(player.id()) {
                player.connection.send(&notice);
            }
        }

        state.rooms.remove(&room_id);
        self.bump(|c| c.races_timed_out += 1);
        self.metrics.races_timed_out_total.inc();
        self.metrics.active_rooms.set(state.rooms.len() as i64);

        Ok(())
    }

    /// Snapshot of engine activity
    pub fn stats(&self) -> EngineStats {
        let mut stats = self
            .counters
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default();

        if let Ok(state) = self.state.lock() {
            stats.active_rooms = state.rooms.len();
            stats.players_waiting = state.queue.len();
        }
        stats
    }

    /// Ids of currently live rooms
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.state
            .lock()
            .map(|state| state.rooms.keys().copied().collect())
            .unwrap_or_default()
    }

    /// One matching cycle: form a room when enough live players are queued.
    ///
    /// Players whose connection died in the queue are dropped permanently;
    /// live survivors short of the threshold go back to the head and the
    /// cycle retries on the next enqueue.
    fn try_match(&self, state: &mut EngineState) -> Result<()> {
        let needed = self.settings.min_players_to_start;
        if state.queue.len() < needed {
            return Ok(());
        }

        let batch = state.queue.take_batch(needed);
        let (live, dead): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(|p| p.connection.is_open());
        for player in &dead {
            info!(
                "Dropping player {} from matchmaking: connection closed",
                player.id()
            );
        }

        if live.len() < needed {
            warn!(
                "Not enough live players to match. Found: {}. Pushing back to queue.",
                live.len()
            );
            state.queue.requeue_front(live);
            return Ok(());
        }

        let room_id = generate_room_id();
        let map_id = rand::thread_rng()
            .gen_range(self.settings.map_id_min..=self.settings.map_id_max);

        let mut players = live;
        for (position, player) in players.iter_mut().enumerate() {
            player.player.team_id = position as u32;
            player.player.index = position as u32;
        }
        let roster: Vec<Player> = players.iter().map(|p| p.player.clone()).collect();

        info!(
            "Match found! Creating room {} (map {}) for players: {}",
            room_id,
            map_id,
            roster
                .iter()
                .map(|p| p.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let room = Room::new(room_id, players, self.settings.race_duration_seconds);
        for player in &room.players {
            if player.connection.is_open() {
                player.connection.send(&ServerEvent::MatchFound {
                    room_id: room_id.to_string(),
                    map_id,
                    index: player.player.index,
                    players: roster.clone(),
                });
            }
        }
        state.rooms.insert(room_id, room);

        self.scheduler
            .schedule_join_deadline(room_id, self.settings.join_wait());
        self.bump(|c| c.rooms_created += 1);
        self.metrics.rooms_created_total.inc();
        self.metrics.active_rooms.set(state.rooms.len() as i64);

        Ok(())
    }

    /// Latch the countdown, broadcast it, and arm the race deadline
    fn start_countdown(&self, room: &mut Room) {
        let now = current_timestamp();
        if !room.begin_countdown(now, self.settings.countdown_seconds) {
            return;
        }

        let start_time = epoch_seconds(now);
        let end_time = start_time + self.settings.countdown_seconds as i64;
        let race_duration = room.race_duration_secs;

        for player in room.players.iter_mut() {
            if player.connection.is_open() {
                player.race_start_time = Some(now);
                player.connection.send(&ServerEvent::StartCountdown {
                    start_time,
                    end_time,
                    race_duration,
                });
            }
        }

        self.scheduler
            .schedule_race_deadline(room.id(), Duration::from_secs(race_duration));
        self.bump(|c| c.races_started += 1);
        self.metrics.races_started_total.inc();
    }

    /// Re-send a running countdown with its original deadline.
    ///
    /// Supports clients that resync by re-sending ready: race start times
    /// are re-baselined to the room's original countdown instant.
    fn resend_countdown(&self, room: &mut Room) {
        let Some(end_time) = room.countdown_end_time else {
            return;
        };
        let start_time = epoch_seconds(current_timestamp());
        let baseline = room.countdown_started_at;
        let race_duration = room.race_duration_secs;

        info!("Room {} countdown already running. Re-sending deadline.", room.id());
        for player in room.players.iter_mut() {
            if player.connection.is_open() {
                player.race_start_time = baseline;
                player.connection.send(&ServerEvent::StartCountdown {
                    start_time,
                    end_time,
                    race_duration,
                });
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| {
            SessionError::InternalError {
                message: "Failed to acquire engine state lock".to_string(),
            }
            .into()
        })
    }

    fn bump(&self, update: impl FnOnce(&mut EngineStats)) {
        if let Ok(mut counters) = self.counters.lock() {
            update(&mut counters);
        }
    }
}
