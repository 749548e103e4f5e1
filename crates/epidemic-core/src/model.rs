//! The shared data model: timestamps, stored records, and operations.
//!
//! These three types are the only state any replica or algorithm reasons
//! about. Keep them small enough to clone and compare cheaply — the
//! scheduler clones `Operation`s into a shared index every tick.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A logical clock value used to order writes to the same key.
///
/// Ordering is lexicographic: `counter` first, then `replica_id` breaks
/// ties between two writes issued at the same counter value by different
/// replicas. There is no wall-clock component — this is a per-origin
/// write counter, not a hybrid logical clock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub counter: u64,
    pub replica_id: String,
}

impl Timestamp {
    #[must_use]
    pub fn new(counter: u64, replica_id: impl Into<String>) -> Self {
        Self {
            counter,
            replica_id: replica_id.into(),
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.replica_id.cmp(&other.replica_id))
    }
}

/// A value as stored locally by a replica, last-write-wins.
///
/// `deleted` records a tombstone rather than removing the key outright —
/// a later DEL must still be able to beat an earlier SET it never saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub value: Option<serde_json::Value>,
    pub deleted: bool,
    pub ts: Timestamp,
}

impl Record {
    #[must_use]
    pub fn set(value: serde_json::Value, ts: Timestamp) -> Self {
        Self {
            value: Some(value),
            deleted: false,
            ts,
        }
    }

    #[must_use]
    pub fn tombstone(ts: Timestamp) -> Self {
        Self {
            value: None,
            deleted: true,
            ts,
        }
    }

    /// The tuple compared by the residue metric: two records diverge if
    /// this differs between replicas.
    #[must_use]
    pub fn divergence_key(&self) -> (bool, Option<serde_json::Value>, u64, &str) {
        (
            self.deleted,
            self.value.clone(),
            self.ts.counter,
            self.ts.replica_id.as_str(),
        )
    }
}

/// The kind of write an [`Operation`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Set,
    Del,
}

/// A single write, identified by a globally unique id and tagged with the
/// replica that originated it.
///
/// `op_id` is conventionally `"{origin}:{counter}"`, formed once at
/// injection time and never recomputed — it is what replicas use to
/// de-duplicate a rumor they have already seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op_id: String,
    pub op: OpKind,
    pub key: String,
    pub value: Option<serde_json::Value>,
    pub ts: Timestamp,
    pub origin: String,
}

impl Operation {
    #[must_use]
    pub fn new(
        op_id: impl Into<String>,
        op: OpKind,
        key: impl Into<String>,
        value: Option<serde_json::Value>,
        ts: Timestamp,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            op_id: op_id.into(),
            op,
            key: key.into(),
            value,
            ts,
            origin: origin.into(),
        }
    }

    /// Apply this operation's write as a [`Record`], independent of what
    /// is already stored — callers compare timestamps before calling this.
    #[must_use]
    pub fn to_record(&self) -> Record {
        match self.op {
            OpKind::Set => Record::set(self.value.clone().unwrap_or(serde_json::Value::Null), self.ts.clone()),
            OpKind::Del => Record::tombstone(self.ts.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_orders_by_counter_then_replica() {
        let a = Timestamp::new(1, "R0");
        let b = Timestamp::new(1, "R1");
        let c = Timestamp::new(2, "R0");
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn timestamp_equal_counter_and_replica_is_equal() {
        assert_eq!(Timestamp::new(5, "R2"), Timestamp::new(5, "R2"));
    }

    #[test]
    fn operation_set_to_record_carries_value() {
        let op = Operation::new(
            "R0:1",
            OpKind::Set,
            "k1",
            Some(serde_json::json!("hello")),
            Timestamp::new(1, "R0"),
            "R0",
        );
        let rec = op.to_record();
        assert!(!rec.deleted);
        assert_eq!(rec.value, Some(serde_json::json!("hello")));
    }

    #[test]
    fn operation_del_to_record_is_tombstone() {
        let op = Operation::new("R0:2", OpKind::Del, "k1", None, Timestamp::new(2, "R0"), "R0");
        let rec = op.to_record();
        assert!(rec.deleted);
        assert_eq!(rec.value, None);
    }

    #[test]
    fn op_kind_serializes_uppercase() {
        let json = serde_json::to_string(&OpKind::Set).unwrap();
        assert_eq!(json, "\"SET\"");
        let json = serde_json::to_string(&OpKind::Del).unwrap();
        assert_eq!(json, "\"DEL\"");
    }

    #[test]
    fn operation_json_round_trip() {
        let op = Operation::new(
            "R3:7",
            OpKind::Set,
            "alpha",
            Some(serde_json::json!(42)),
            Timestamp::new(7, "R3"),
            "R3",
        );
        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn divergence_key_distinguishes_tombstone_from_empty_set() {
        let ts = Timestamp::new(1, "R0");
        let tombstone = Record::tombstone(ts.clone());
        let empty_set = Record::set(serde_json::Value::Null, ts);
        assert_ne!(tombstone.divergence_key(), empty_set.divergence_key());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ordering_is_total_and_transitive(
                (c1, r1) in (0u64..10, "[a-c]"),
                (c2, r2) in (0u64..10, "[a-c]"),
                (c3, r3) in (0u64..10, "[a-c]"),
            ) {
                let a = Timestamp::new(c1, r1);
                let b = Timestamp::new(c2, r2);
                let c = Timestamp::new(c3, r3);
                if a < b && b < c {
                    prop_assert!(a < c);
                }
                prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
            }

            #[test]
            fn ordering_is_antisymmetric(
                (c1, r1) in (0u64..10, "[a-c]"),
                (c2, r2) in (0u64..10, "[a-c]"),
            ) {
                let a = Timestamp::new(c1, r1);
                let b = Timestamp::new(c2, r2);
                prop_assert_eq!(a.cmp(&b).reverse(), b.cmp(&a));
            }
        }
    }
}
