//! Deferred deadline scheduling
//!
//! Deadlines are one-shot: a spawned sleep emits a [`TimerEvent`] on the
//! scheduler's channel and a single dispatcher task re-enters the engine
//! serially. Deadlines are never cancelled; a fired event re-resolves its
//! room by id and treats directory absence as already handled.

use crate::types::RoomId;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::debug;

/// A deadline that has come due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Join-timeout: the room must have enough ready players by now
    JoinDeadline(RoomId),
    /// Race-timeout: the race is force-concluded regardless of completion
    RaceDeadline(RoomId),
}

/// Hands out one-shot deadlines bound to room ids
#[derive(Debug, Clone)]
pub struct TimeoutScheduler {
    tx: UnboundedSender<TimerEvent>,
}

impl TimeoutScheduler {
    /// Create a scheduler and the event stream its deadlines feed
    pub fn channel() -> (Self, UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedule the join-timeout for a freshly created room
    pub fn schedule_join_deadline(&self, room_id: RoomId, delay: Duration) {
        self.schedule(TimerEvent::JoinDeadline(room_id), delay);
    }

    /// Schedule the race-timeout after a countdown starts
    pub fn schedule_race_deadline(&self, room_id: RoomId, delay: Duration) {
        self.schedule(TimerEvent::RaceDeadline(room_id), delay);
    }

    fn schedule(&self, event: TimerEvent, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if tx.send(event).is_err() {
                debug!("Timer dispatcher gone, dropping {:?}", event);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_room_id;

    #[tokio::test]
    async fn test_deadline_fires_after_delay() {
        let (scheduler, mut events) = TimeoutScheduler::channel();
        let room_id = generate_room_id();

        scheduler.schedule_join_deadline(room_id, Duration::from_millis(10));

        let event = events.recv().await.unwrap();
        assert_eq!(event, TimerEvent::JoinDeadline(room_id));
    }

    #[tokio::test]
    async fn test_deadlines_fire_in_delay_order() {
        let (scheduler, mut events) = TimeoutScheduler::channel();
        let first = generate_room_id();
        let second = generate_room_id();

        scheduler.schedule_race_deadline(second, Duration::from_millis(50));
        scheduler.schedule_join_deadline(first, Duration::from_millis(5));

        assert_eq!(events.recv().await.unwrap(), TimerEvent::JoinDeadline(first));
        assert_eq!(
            events.recv().await.unwrap(),
            TimerEvent::RaceDeadline(second)
        );
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_panic() {
        let (scheduler, events) = TimeoutScheduler::channel();
        drop(events);

        scheduler.schedule_join_deadline(generate_room_id(), Duration::from_millis(1));
        sleep(Duration::from_millis(10)).await;
    }
}
