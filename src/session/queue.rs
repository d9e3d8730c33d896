//! FIFO matchmaking queue
//!
//! Insertion order defines matching priority. The matcher takes a batch
//! from the head; survivors of a failed liveness check are pushed back onto
//! the head so their priority is preserved.

use crate::error::{Result, SessionError};
use crate::session::room::RuntimePlayer;
use std::collections::VecDeque;

/// Ordered waiting list of players wanting a session
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<RuntimePlayer>,
}

impl MatchmakingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waiting players
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the given player is currently queued
    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|p| p.id() == player_id)
    }

    /// Append a player to the tail. A player appears at most once; a
    /// duplicate id is rejected.
    pub fn enqueue(&mut self, player: RuntimePlayer) -> Result<()> {
        if self.contains(player.id()) {
            return Err(SessionError::PlayerAlreadyQueued {
                player_id: player.id().to_string(),
            }
            .into());
        }

        self.entries.push_back(player);
        Ok(())
    }

    /// Remove a queued player, used on disconnect. O(n) scan.
    pub fn remove(&mut self, player_id: &str) -> Option<RuntimePlayer> {
        let position = self.entries.iter().position(|p| p.id() == player_id)?;
        self.entries.remove(position)
    }

    /// Take up to `count` players from the head, in priority order
    pub fn take_batch(&mut self, count: usize) -> Vec<RuntimePlayer> {
        let take = count.min(self.entries.len());
        self.entries.drain(..take).collect()
    }

    /// Push players back onto the head, preserving their relative order
    /// (the first element of `players` ends up at the front of the queue).
    pub fn requeue_front(&mut self, players: Vec<RuntimePlayer>) {
        for player in players.into_iter().rev() {
            self.entries.push_front(player);
        }
    }

    /// Ids of waiting players in priority order
    pub fn waiting_ids(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Player;
    use crate::ws::registry::ConnectionHandle;

    fn queued_player(id: &str) -> RuntimePlayer {
        let (handle, _rx) = ConnectionHandle::channel(id);
        // Receivers are dropped; these players only exercise queue ordering.
        RuntimePlayer::new(Player::unassigned(id), handle)
    }

    #[test]
    fn test_enqueue_preserves_fifo_order() {
        let mut queue = MatchmakingQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(queued_player(id)).unwrap();
        }

        assert_eq!(queue.waiting_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(queued_player("a")).unwrap();
        assert!(queue.enqueue(queued_player("a")).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_queued_player() {
        let mut queue = MatchmakingQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(queued_player(id)).unwrap();
        }

        let removed = queue.remove("b").unwrap();
        assert_eq!(removed.id(), "b");
        assert_eq!(queue.waiting_ids(), vec!["a", "c"]);
        assert!(queue.remove("b").is_none());
    }

    #[test]
    fn test_take_batch_from_head() {
        let mut queue = MatchmakingQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(queued_player(id)).unwrap();
        }

        let batch = queue.take_batch(2);
        let ids: Vec<_> = batch.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(queue.waiting_ids(), vec!["c"]);
    }

    #[test]
    fn test_take_batch_caps_at_len() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(queued_player("a")).unwrap();
        assert_eq!(queue.take_batch(5).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front_restores_priority() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(queued_player("c")).unwrap();

        queue.requeue_front(vec![queued_player("a"), queued_player("b")]);
        assert_eq!(queue.waiting_ids(), vec!["a", "b", "c"]);
    }
}
