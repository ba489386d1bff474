//! Time utilities for match clocks

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// True when strictly more than `limit` has passed between `since` and `now`.
/// A `since` in the future never counts as exceeded.
pub fn exceeded(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed > limit)
        .unwrap_or(false)
}

/// True when at least `limit` has passed
pub fn reached(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed >= limit)
        .unwrap_or(false)
}
