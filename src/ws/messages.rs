//! Wire protocol message definitions and serialization
//!
//! Every outbound frame is a JSON object of the shape
//! `{"type":"normal","cmd":...,"code":...,...}`; the `cmd` value
//! discriminates the payload. Inbound frames carry a `type` field only.

use crate::error::{Result, SessionError};
use crate::types::{Player, PlayerId};
use serde::{Deserialize, Serialize};

/// Close code sent when evicting a member that never readied up
pub const CLOSE_NORMAL: u16 = 1000;

/// Close reason for the join-timeout eviction
pub const NOT_READY_CLOSE_REASON: &str = "Timeout: Did not ready up in time.";

/// Acknowledgment text sent on enqueue
pub const QUEUE_GREETING: &str = "You have been added to the matchmaking queue.";

/// Notice sent to unfinished members when the race deadline elapses
pub const RACE_TIMEOUT_NOTICE: &str = "Race has ended due to time limit.";

/// Notice sent to all members when a room fails its join deadline
pub const MATCH_FAILED_NOTICE: &str =
    "Match failed to start due to other players not readying up.";

/// Inbound message from a client.
///
/// Unrecognized `type` values deserialize to `Other` and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ready,
    Finish,
    #[serde(other)]
    Other,
}

impl ClientMessage {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            SessionError::InvalidMessage {
                reason: format!("Failed to parse client message: {}", e),
            }
            .into()
        })
    }
}

/// One entry of a race ranking broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: u32,
    pub player_id: PlayerId,
    /// Completion time in milliseconds; omitted when the start was unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

/// Outbound event, discriminated by `cmd` on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd")]
pub enum ServerEvent {
    #[serde(rename = "in_queue")]
    InQueue { message: String },

    #[serde(rename = "matchFound", rename_all = "camelCase")]
    MatchFound {
        room_id: String,
        map_id: u32,
        /// The receiving player's own roster index
        index: u32,
        players: Vec<Player>,
    },

    #[serde(rename = "startCountdown", rename_all = "camelCase")]
    StartCountdown {
        /// Whole seconds since epoch
        start_time: i64,
        /// Whole seconds since epoch
        end_time: i64,
        /// Race length in seconds
        race_duration: u64,
    },

    // The misspelled cmd is load-bearing: deployed clients match on it.
    #[serde(rename = "racfinisheRanking", rename_all = "camelCase")]
    FinishRanking {
        rank: u32,
        player_id: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<i64>,
    },

    #[serde(rename = "raceRanking")]
    RaceRanking { rankings: Vec<RankingEntry> },

    #[serde(rename = "raceTimeout")]
    RaceTimeout { message: String },

    #[serde(rename = "matchFailed")]
    MatchFailed { message: String },
}

impl ServerEvent {
    /// Status code carried in the envelope for this event
    pub fn code(&self) -> u16 {
        match self {
            ServerEvent::InQueue { .. } => 202,
            ServerEvent::MatchFound { .. } => 200,
            ServerEvent::StartCountdown { .. } => 200,
            ServerEvent::FinishRanking { .. } => 200,
            ServerEvent::RaceRanking { .. } => 200,
            ServerEvent::RaceTimeout { .. } => 400,
            ServerEvent::MatchFailed { .. } => 408,
        }
    }

    /// The wire `cmd` discriminant, for logging
    pub fn cmd(&self) -> &'static str {
        match self {
            ServerEvent::InQueue { .. } => "in_queue",
            ServerEvent::MatchFound { .. } => "matchFound",
            ServerEvent::StartCountdown { .. } => "startCountdown",
            ServerEvent::FinishRanking { .. } => "racfinisheRanking",
            ServerEvent::RaceRanking { .. } => "raceRanking",
            ServerEvent::RaceTimeout { .. } => "raceTimeout",
            ServerEvent::MatchFailed { .. } => "matchFailed",
        }
    }
}

/// Envelope wrapping every outbound event
#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    code: u16,
    #[serde(flatten)]
    event: &'a ServerEvent,
}

/// Serialize an event into its wire envelope
pub fn encode_event(event: &ServerEvent) -> Result<String> {
    let envelope = Envelope {
        kind: "normal",
        code: event.code(),
        event,
    };
    serde_json::to_string(&envelope).map_err(|e| {
        SessionError::InternalError {
            message: format!("Failed to serialize {} event: {}", event.cmd(), e),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_and_finish() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ready"}"#).unwrap(),
            ClientMessage::Ready
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"finish"}"#).unwrap(),
            ClientMessage::Finish
        );
    }

    #[test]
    fn test_unknown_type_is_other() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"emote"}"#).unwrap(),
            ClientMessage::Other
        );
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse(r#"{"kind":"ready"}"#).is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let event = ServerEvent::InQueue {
            message: QUEUE_GREETING.to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(json["type"], "normal");
        assert_eq!(json["cmd"], "in_queue");
        assert_eq!(json["code"], 202);
        assert_eq!(json["message"], QUEUE_GREETING);
    }

    #[test]
    fn test_match_found_wire_fields() {
        let event = ServerEvent::MatchFound {
            room_id: "room-1".to_string(),
            map_id: 3,
            index: 1,
            players: vec![
                Player {
                    id: "a".to_string(),
                    team_id: 0,
                    index: 0,
                },
                Player {
                    id: "b".to_string(),
                    team_id: 1,
                    index: 1,
                },
            ],
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(json["cmd"], "matchFound");
        assert_eq!(json["code"], 200);
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["mapId"], 3);
        assert_eq!(json["index"], 1);
        assert_eq!(json["players"][0]["teamId"], 0);
        assert_eq!(json["players"][1]["id"], "b");
    }

    #[test]
    fn test_finish_ranking_preserves_legacy_cmd() {
        let event = ServerEvent::FinishRanking {
            rank: 1,
            player_id: "a".to_string(),
            duration: Some(42_000),
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_event(&event).unwrap()).unwrap();

        assert_eq!(json["cmd"], "racfinisheRanking");
        assert_eq!(json["playerId"], "a");
        assert_eq!(json["duration"], 42_000);
    }

    #[test]
    fn test_missing_duration_is_omitted() {
        let event = ServerEvent::FinishRanking {
            rank: 1,
            player_id: "a".to_string(),
            duration: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_event(&event).unwrap()).unwrap();

        assert!(json.get("duration").is_none());
    }

    #[test]
    fn test_failure_codes() {
        let timeout = ServerEvent::RaceTimeout {
            message: RACE_TIMEOUT_NOTICE.to_string(),
        };
        let failed = ServerEvent::MatchFailed {
            message: MATCH_FAILED_NOTICE.to_string(),
        };
        assert_eq!(timeout.code(), 400);
        assert_eq!(failed.code(), 408);
    }
}
