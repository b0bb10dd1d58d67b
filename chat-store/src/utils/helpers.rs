use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a message id from the current time.
/// UUID v7 leads with a millisecond timestamp and stays unique when two
/// messages land in the same millisecond.
pub fn generate_message_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current time, never earlier than `latest`.
/// Keeps a chat's timestamps non-decreasing if the wall clock steps back.
pub fn next_timestamp(latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match latest {
        Some(latest) if latest > now => latest,
        _ => now,
    }
}
