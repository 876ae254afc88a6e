pub mod config;
pub mod logging;

pub mod network;
pub mod queue;
pub mod request;
pub mod retry;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix seconds (for queue timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
