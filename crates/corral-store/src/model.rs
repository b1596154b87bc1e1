//! Stream data model

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use corral_common::CorralError;

/// Identifier of a published stream entry.
///
/// Ids are assigned by the store at publish time and are strictly monotonic
/// within a stream: the millisecond timestamp of the publish, plus a sequence
/// number disambiguating entries published in the same millisecond. The text
/// form is `"{ms}-{seq}"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EntryId {
    /// Publish timestamp (Unix millis)
    pub ms: i64,
    /// Sequence number within the millisecond
    pub seq: u64,
}

impl EntryId {
    /// Id ordered before every assigned id; a group whose delivery cursor is
    /// `ZERO` has seen nothing yet.
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    pub fn new(ms: i64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = CorralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ms, seq) = s
            .split_once('-')
            .ok_or_else(|| CorralError::MalformedEntryId(s.to_string()))?;
        let ms = ms
            .parse::<i64>()
            .map_err(|_| CorralError::MalformedEntryId(s.to_string()))?;
        let seq = seq
            .parse::<u64>()
            .map_err(|_| CorralError::MalformedEntryId(s.to_string()))?;
        Ok(EntryId { ms, seq })
    }
}

/// A published stream entry as delivered to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Store-assigned monotonic id
    pub id: EntryId,
    /// Application payload
    pub fields: BTreeMap<String, String>,
}

impl StreamEntry {
    pub fn new(id: EntryId, fields: BTreeMap<String, String>) -> Self {
        Self { id, fields }
    }
}

/// Bookkeeping view of a delivered-but-unacknowledged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Entry id
    pub id: EntryId,
    /// Consumer the entry is currently assigned to
    pub consumer: String,
    /// Time since the last delivery to any consumer (millis)
    pub idle_ms: u64,
    /// Number of times the entry has been delivered
    pub delivery_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_ordering() {
        let a = EntryId::new(100, 0);
        let b = EntryId::new(100, 1);
        let c = EntryId::new(101, 0);

        assert!(a < b);
        assert!(b < c);
        assert!(EntryId::ZERO < a);
    }

    #[test]
    fn test_entry_id_display_parse_roundtrip() {
        let id = EntryId::new(1754400000123, 7);
        assert_eq!(id.to_string(), "1754400000123-7");
        assert_eq!("1754400000123-7".parse::<EntryId>().unwrap(), id);
    }

    #[test]
    fn test_entry_id_parse_malformed() {
        assert!("".parse::<EntryId>().is_err());
        assert!("123".parse::<EntryId>().is_err());
        assert!("abc-0".parse::<EntryId>().is_err());
        assert!("123-xyz".parse::<EntryId>().is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_entry_id_roundtrip(ms in 0i64..i64::MAX, seq in 0u64..u64::MAX) {
                let id = EntryId::new(ms, seq);
                prop_assert_eq!(id.to_string().parse::<EntryId>().unwrap(), id);
            }

            #[test]
            fn prop_entry_id_order_matches_fields(
                a_ms in 0i64..1_000_000, a_seq in 0u64..1000,
                b_ms in 0i64..1_000_000, b_seq in 0u64..1000,
            ) {
                let a = EntryId::new(a_ms, a_seq);
                let b = EntryId::new(b_ms, b_seq);
                prop_assert_eq!(a.cmp(&b), (a_ms, a_seq).cmp(&(b_ms, b_seq)));
            }
        }
    }
}
