//! Utility functions for the race session service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique room ID
pub fn generate_room_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a timestamp to whole seconds since the Unix epoch.
///
/// Countdown broadcasts carry second-granularity deadlines; sub-second
/// precision is truncated, never rounded.
pub fn epoch_seconds(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis().div_euclid(1000)
}

/// Elapsed milliseconds between two instants
pub fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.timestamp_millis() - start.timestamp_millis()
}
