//! Lock data model

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque proof of lock ownership.
///
/// Generated fresh for every acquisition (UUIDv4, 122 bits of entropy) so
/// that a stale holder can never release a lease it no longer owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerToken(String);

impl OwnerToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock acquisition options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOptions {
    /// Lease duration in milliseconds; the lock self-expires after this
    /// long no matter what the holder does
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,
    /// Maximum time to keep retrying acquisition (0 = exactly one attempt)
    #[serde(default)]
    pub wait_ms: u64,
    /// Delay between acquisition attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_lease_ms() -> u64 {
    30000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease_ms: 30000,
            wait_ms: 0,
            poll_interval_ms: 100,
        }
    }
}
