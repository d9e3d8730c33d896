//! End-to-end session lifecycle tests driven through the public API
//!
//! These tests exercise the engine the way the transport layer does:
//! channel-backed connection handles stand in for live sockets, and timer
//! deadlines are fired by hand.

use paddock::config::MatchmakingSettings;
use paddock::metrics::MetricsCollector;
use paddock::session::{SessionEngine, TimeoutScheduler};
use paddock::ws::registry::{ConnectionHandle, OutboundFrame};
use paddock::ws::ConnectionRegistry;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    engine: Arc<SessionEngine>,
}

impl Harness {
    fn new(settings: MatchmakingSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let (scheduler, _timer_events) = TimeoutScheduler::channel();
        let engine = Arc::new(SessionEngine::new(
            registry,
            settings,
            scheduler,
            Arc::new(MetricsCollector::default()),
        ));
        Self { engine }
    }

    fn connect(&self, id: &str) -> UnboundedReceiver<OutboundFrame> {
        let (handle, rx) = ConnectionHandle::channel(id);
        self.engine.register_player(id, handle).unwrap();
        rx
    }
}

fn events(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let OutboundFrame::Event(json) = frame {
            out.push(serde_json::from_str(&json).unwrap());
        }
    }
    out
}

fn cmds(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["cmd"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn full_happy_path_from_queue_to_final_ranking() {
    let harness = Harness::new(MatchmakingSettings::default());
    let mut rx1 = harness.connect("alice");
    let mut rx2 = harness.connect("bob");

    // Both were greeted and matched.
    let seen1 = cmds(&events(&mut rx1));
    assert_eq!(seen1, vec!["in_queue", "matchFound"]);

    // Ready-up handshake completes and the countdown goes out to everyone.
    harness.engine.handle_message("alice", r#"{"type":"ready"}"#).unwrap();
    harness.engine.handle_message("bob", r#"{"type":"ready"}"#).unwrap();

    let countdown1 = events(&mut rx1);
    let countdown2 = events(&mut rx2);
    assert!(cmds(&countdown1).contains(&"startCountdown".to_string()));
    assert!(cmds(&countdown2)
        .iter()
        .filter(|c| *c == "startCountdown")
        .count()
        >= 1);

    // First finisher is rank 1, second is rank 2, then the final table.
    harness.engine.handle_message("alice", r#"{"type":"finish"}"#).unwrap();
    harness.engine.handle_message("bob", r#"{"type":"finish"}"#).unwrap();

    let closing = events(&mut rx1);
    let live_ranks: Vec<_> = closing
        .iter()
        .filter(|e| e["cmd"] == "racfinisheRanking")
        .collect();
    assert_eq!(live_ranks.len(), 2);
    assert_eq!(live_ranks[0]["playerId"], "alice");
    assert_eq!(live_ranks[0]["rank"], 1);
    assert_eq!(live_ranks[1]["playerId"], "bob");
    assert_eq!(live_ranks[1]["rank"], 2);

    let final_table = closing
        .iter()
        .find(|e| e["cmd"] == "raceRanking")
        .expect("final ranking broadcast");
    let rankings = final_table["rankings"].as_array().unwrap();
    assert_eq!(rankings.len(), 2);
    assert_eq!(rankings[0]["playerId"], "alice");
    assert_eq!(rankings[1]["playerId"], "bob");

    // The room is gone; outcomes are mutually exclusive.
    let stats = harness.engine.stats();
    assert_eq!(stats.active_rooms, 0);
    assert_eq!(stats.races_completed, 1);
    assert_eq!(stats.races_timed_out, 0);
    assert_eq!(stats.matches_failed, 0);
}

#[tokio::test]
async fn room_is_removed_exactly_once_across_all_paths() {
    let harness = Harness::new(MatchmakingSettings::default());
    let _rx1 = harness.connect("a");
    let _rx2 = harness.connect("b");
    let room_id = harness.engine.room_ids()[0];

    harness.engine.handle_message("a", r#"{"type":"ready"}"#).unwrap();
    harness.engine.handle_message("b", r#"{"type":"ready"}"#).unwrap();
    harness.engine.handle_message("a", r#"{"type":"finish"}"#).unwrap();
    harness.engine.handle_message("b", r#"{"type":"finish"}"#).unwrap();
    assert!(harness.engine.room_ids().is_empty());

    // Stale deadlines for the departed room are harmless no-ops.
    harness.engine.handle_join_timeout(room_id).unwrap();
    harness.engine.handle_race_timeout(room_id).unwrap();
    harness.engine.handle_race_timeout(room_id).unwrap();

    let stats = harness.engine.stats();
    assert_eq!(stats.races_completed, 1);
    assert_eq!(stats.races_timed_out, 0);
    assert_eq!(stats.matches_failed, 0);
}

#[tokio::test]
async fn countdown_deadline_is_stable_across_late_readies() {
    let harness = Harness::new(MatchmakingSettings::default());
    let mut rx1 = harness.connect("a");
    let mut rx2 = harness.connect("b");

    harness.engine.handle_ready("a").unwrap();
    harness.engine.handle_ready("b").unwrap();
    let first = events(&mut rx1);
    let original = first
        .iter()
        .find(|e| e["cmd"] == "startCountdown")
        .unwrap()["endTime"]
        .as_i64()
        .unwrap();

    for _ in 0..3 {
        harness.engine.handle_ready("b").unwrap();
    }

    for rx in [&mut rx1, &mut rx2] {
        for event in events(rx) {
            if event["cmd"] == "startCountdown" {
                assert_eq!(event["endTime"].as_i64().unwrap(), original);
            }
        }
    }
}

#[tokio::test]
async fn join_deadline_failure_notifies_and_destroys() {
    let harness = Harness::new(MatchmakingSettings::default());
    let mut rx1 = harness.connect("a");
    let mut rx2 = harness.connect("b");
    events(&mut rx1);
    events(&mut rx2);

    // Only one of two readies up before the deadline.
    harness.engine.handle_ready("a").unwrap();
    let room_id = harness.engine.room_ids()[0];
    harness.engine.handle_join_timeout(room_id).unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let seen = events(rx);
        let failed = seen.iter().find(|e| e["cmd"] == "matchFailed").unwrap();
        assert_eq!(failed["code"], 408);
        assert!(!cmds(&seen).contains(&"startCountdown".to_string()));
    }
    assert!(harness.engine.room_ids().is_empty());

    // Nobody was requeued.
    assert_eq!(harness.engine.stats().players_waiting, 0);
}

#[tokio::test]
async fn join_deadline_force_start_races_the_ready_subset() {
    let settings = MatchmakingSettings {
        min_players_to_start: 3,
        ..Default::default()
    };
    let harness = Harness::new(settings);
    let mut rx1 = harness.connect("a");
    let mut rx2 = harness.connect("b");
    let mut rx3 = harness.connect("c");

    harness.engine.handle_ready("a").unwrap();
    harness.engine.handle_ready("b").unwrap();
    let room_id = harness.engine.room_ids()[0];
    harness.engine.handle_join_timeout(room_id).unwrap();

    // The laggard is closed with a normal code; the rest get a countdown.
    let mut saw_close = false;
    while let Ok(frame) = rx3.try_recv() {
        if let OutboundFrame::Close { code, .. } = frame {
            assert_eq!(code, 1000);
            saw_close = true;
        }
    }
    assert!(saw_close);
    assert!(cmds(&events(&mut rx1)).contains(&"startCountdown".to_string()));
    assert!(cmds(&events(&mut rx2)).contains(&"startCountdown".to_string()));

    // The shrunken room completes with only the ready subset.
    harness.engine.handle_finish("a").unwrap();
    harness.engine.handle_finish("b").unwrap();
    assert!(harness.engine.room_ids().is_empty());

    let final_table = events(&mut rx1)
        .into_iter()
        .find(|e| e["cmd"] == "raceRanking")
        .unwrap();
    assert_eq!(final_table["rankings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn race_deadline_sweeps_unfinished_members() {
    let harness = Harness::new(MatchmakingSettings::default());
    let mut rx1 = harness.connect("a");
    let mut rx2 = harness.connect("b");

    harness.engine.handle_ready("a").unwrap();
    harness.engine.handle_ready("b").unwrap();
    harness.engine.handle_finish("a").unwrap();
    events(&mut rx1);
    events(&mut rx2);

    let room_id = harness.engine.room_ids()[0];
    harness.engine.handle_race_timeout(room_id).unwrap();

    // Only the straggler is told the race timed out.
    assert!(events(&mut rx1).is_empty());
    let timeout = events(&mut rx2)
        .into_iter()
        .find(|e| e["cmd"] == "raceTimeout")
        .unwrap();
    assert_eq!(timeout["code"], 400);
    assert!(harness.engine.room_ids().is_empty());
}

#[tokio::test]
async fn disconnected_member_is_swept_not_ejected() {
    let harness = Harness::new(MatchmakingSettings::default());
    let mut rx1 = harness.connect("a");
    let rx2 = harness.connect("b");

    // b drops after the match is made; the room keeps its membership.
    drop(rx2);
    harness.engine.handle_disconnect("b").unwrap();
    assert_eq!(harness.engine.room_ids().len(), 1);

    // a readies up alone; the join deadline then fails the room because
    // one ready player is below the force-start minimum.
    harness.engine.handle_ready("a").unwrap();
    let room_id = harness.engine.room_ids()[0];
    harness.engine.handle_join_timeout(room_id).unwrap();

    let seen = events(&mut rx1);
    assert!(seen.iter().any(|e| e["cmd"] == "matchFailed"));
    assert!(harness.engine.room_ids().is_empty());
}
