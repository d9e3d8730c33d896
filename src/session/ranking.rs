//! Race ranking computation
//!
//! Finished players are ordered by ascending completion duration. A
//! finished entry without a duration should not occur, but sorts last
//! rather than panicking. The sort is stable, so equal durations keep
//! finish order.

use crate::session::room::Room;
use crate::ws::messages::RankingEntry;

/// Dense 1-based ranking of all currently-finished players in a room
pub fn compute_rankings(room: &Room) -> Vec<RankingEntry> {
    let mut finished: Vec<_> = room
        .finished_players
        .iter()
        .filter_map(|id| room.player(id))
        .collect();

    finished.sort_by_key(|p| p.race_duration_ms.unwrap_or(i64::MAX));

    finished
        .iter()
        .enumerate()
        .map(|(i, p)| RankingEntry {
            rank: (i + 1) as u32,
            player_id: p.id().to_string(),
            duration: p.race_duration_ms,
        })
        .collect()
}

/// Rank of one player within a computed ranking
pub fn rank_of(rankings: &[RankingEntry], player_id: &str) -> Option<u32> {
    rankings
        .iter()
        .find(|entry| entry.player_id == player_id)
        .map(|entry| entry.rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::room::RuntimePlayer;
    use crate::types::Player;
    use crate::utils::generate_room_id;
    use crate::ws::registry::ConnectionHandle;

    fn room_with_finishers(finishers: &[(&str, Option<i64>)]) -> Room {
        let mut players = Vec::new();
        for (i, (id, _)) in finishers.iter().enumerate() {
            let (handle, _rx) = ConnectionHandle::channel(*id);
            let player = Player {
                id: id.to_string(),
                team_id: i as u32,
                index: i as u32,
            };
            players.push(RuntimePlayer::new(player, handle));
        }
        let mut room = Room::new(generate_room_id(), players, 120);
        for (id, duration) in finishers {
            let player = room.player_mut(id).unwrap();
            player.race_duration_ms = *duration;
            room.finished_players.push(id.to_string());
        }
        room
    }

    #[test]
    fn test_orders_by_ascending_duration() {
        let room = room_with_finishers(&[
            ("slow", Some(90_000)),
            ("fast", Some(30_000)),
            ("mid", Some(60_000)),
        ]);

        let rankings = compute_rankings(&room);
        let order: Vec<_> = rankings.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(order, vec!["fast", "mid", "slow"]);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[2].rank, 3);
    }

    #[test]
    fn test_missing_duration_sorts_last() {
        let room = room_with_finishers(&[("unknown", None), ("timed", Some(45_000))]);

        let rankings = compute_rankings(&room);
        assert_eq!(rankings[0].player_id, "timed");
        assert_eq!(rankings[1].player_id, "unknown");
        assert_eq!(rankings[1].duration, None);
    }

    #[test]
    fn test_equal_durations_keep_finish_order() {
        let room = room_with_finishers(&[
            ("first", Some(50_000)),
            ("second", Some(50_000)),
        ]);

        let rankings = compute_rankings(&room);
        assert_eq!(rankings[0].player_id, "first");
        assert_eq!(rankings[1].player_id, "second");
    }

    #[test]
    fn test_rank_of() {
        let room = room_with_finishers(&[("a", Some(10_000)), ("b", Some(20_000))]);
        let rankings = compute_rankings(&room);

        assert_eq!(rank_of(&rankings, "a"), Some(1));
        assert_eq!(rank_of(&rankings, "b"), Some(2));
        assert_eq!(rank_of(&rankings, "ghost"), None);
    }

    #[test]
    fn test_earlier_shorter_finisher_never_outranked() {
        // The second finisher is slower; the first must keep rank 1.
        let room = room_with_finishers(&[("a", Some(30_000)), ("b", Some(35_000))]);
        let rankings = compute_rankings(&room);
        assert!(rank_of(&rankings, "a").unwrap() < rank_of(&rankings, "b").unwrap());
    }
}
