//! Shared utilities.

pub mod logging;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch; 0 for a clock set before it.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
