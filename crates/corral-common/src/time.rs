//! Epoch time helpers
//!
//! All scores, lease expiries, and idle times in Corral are Unix epoch
//! milliseconds, matching what the remote store keys its TTLs and ordered-set
//! scores on.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
