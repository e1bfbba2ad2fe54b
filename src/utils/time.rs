use chrono::{DateTime, Utc};

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Get current Unix timestamp in seconds, truncated to the 32-bit handshake field
pub fn current_timestamp_secs() -> u32 {
    Utc::now().timestamp() as u32
}

/// Milliseconds elapsed since `since`; never negative
pub fn elapsed_millis(since: DateTime<Utc>) -> i64 {
    (Utc::now() - since).num_milliseconds().max(0)
}
