//! Common types used throughout the race session service

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players, supplied by the client at connect time
pub type PlayerId = String;

/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Identity of a matched player as it appears on the wire.
///
/// `team_id` and `index` are assigned at match time as the player's 0-based
/// position in match order; both carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub team_id: u32,
    pub index: u32,
}

impl Player {
    /// Create an unmatched player; team and index are assigned by the matcher.
    pub fn unassigned(id: impl Into<PlayerId>) -> Self {
        Self {
            id: id.into(),
            team_id: 0,
            index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_player_defaults() {
        let player = Player::unassigned("p1");
        assert_eq!(player.id, "p1");
        assert_eq!(player.team_id, 0);
        assert_eq!(player.index, 0);
    }

    #[test]
    fn test_player_wire_field_names() {
        let player = Player {
            id: "p1".to_string(),
            team_id: 1,
            index: 1,
        };
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["teamId"], 1);
        assert_eq!(json["index"], 1);
    }
}
