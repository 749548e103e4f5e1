//! A single replica: its local store, seen-op set, and active rumors.

use std::collections::{BTreeMap, BTreeSet};

use epidemic_core::error::ProtocolError;
use epidemic_core::merge::wins;
use epidemic_core::model::{OpKind, Operation, Record};

use crate::rng::DeterministicRng;

/// One participant in the gossip network.
///
/// A replica only ever sees the operations delivered to it — it has no
/// visibility into any other replica's store. Everything it knows about
/// peers comes from messages the network delivers.
///
/// Maps are `BTreeMap`/`BTreeSet` rather than hash-based: a run must
/// produce byte-identical output for a given seed regardless of the
/// process's hash-randomization, and several algorithms iterate these
/// maps directly (rumor retirement, anti-entropy sampling).
#[derive(Debug, Clone)]
pub struct Replica {
    pub id: String,
    pub store: BTreeMap<String, Record>,
    seen_ops: BTreeSet<String>,
    /// op_id -> remaining rumor budget.
    pub active_rumors: BTreeMap<String, u32>,
    /// op_id -> count of SEEN acks received while gossiping it.
    pub rumor_seen_hits: BTreeMap<String, u32>,
    rng: DeterministicRng,
    pub ops_applied: u64,
    pub ops_received: u64,
    pub ops_sent: u64,
}

impl Replica {
    #[must_use]
    pub fn new(id: impl Into<String>, store: BTreeMap<String, Record>, seed: u64) -> Self {
        Self {
            id: id.into(),
            store,
            seen_ops: BTreeSet::new(),
            active_rumors: BTreeMap::new(),
            rumor_seen_hits: BTreeMap::new(),
            rng: DeterministicRng::new(seed),
            ops_applied: 0,
            ops_received: 0,
            ops_sent: 0,
        }
    }

    /// Apply an operation's write to the store under last-write-wins,
    /// regardless of whether it has been seen before. Returns whether the
    /// store actually changed.
    pub fn apply(&mut self, op: &Operation) -> Result<bool, ProtocolError> {
        match op.op {
            OpKind::Set | OpKind::Del => {}
        }
        let current_ts = self.store.get(&op.key).map(|r| &r.ts);
        if wins(current_ts, &op.ts) {
            self.store.insert(op.key.clone(), op.to_record());
            self.ops_applied += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Receive an operation from the network or an injector: de-duplicate
    /// by `op_id`, then apply if new. Returns `(was_new, changed)`.
    pub fn on_receive(&mut self, op: &Operation) -> Result<(bool, bool), ProtocolError> {
        self.ops_received += 1;
        if self.seen_ops.contains(&op.op_id) {
            return Ok((false, false));
        }
        self.seen_ops.insert(op.op_id.clone());
        let changed = self.apply(op)?;
        Ok((true, changed))
    }

    /// Start gossiping `op_id` with `budget`, unless it is already active
    /// (in which case its existing budget is left untouched).
    pub fn activate_rumor(&mut self, op_id: &str, budget: u32) {
        if !self.active_rumors.contains_key(op_id) {
            self.active_rumors.insert(op_id.to_string(), budget);
            self.rumor_seen_hits.insert(op_id.to_string(), 0);
        }
    }

    /// Choose a random peer from the given candidate list.
    #[must_use]
    pub fn pick_peer<'a>(&mut self, peers: &'a [String]) -> &'a str {
        let idx = self.rng.next_bounded(peers.len() as u64) as usize;
        &peers[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidemic_core::model::Timestamp;

    fn set_op(id: &str, key: &str, counter: u64, origin: &str) -> Operation {
        Operation::new(
            id,
            OpKind::Set,
            key,
            Some(serde_json::json!(counter)),
            Timestamp::new(counter, origin),
            origin,
        )
    }

    #[test]
    fn apply_accepts_first_write_to_a_key() {
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        let changed = r.apply(&set_op("R0:1", "k", 1, "R0")).unwrap();
        assert!(changed);
        assert_eq!(r.ops_applied, 1);
    }

    #[test]
    fn apply_rejects_stale_write() {
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.apply(&set_op("R0:5", "k", 5, "R0")).unwrap();
        let changed = r.apply(&set_op("R1:1", "k", 1, "R1")).unwrap();
        assert!(!changed);
        assert_eq!(r.store["k"].ts.counter, 5);
    }

    #[test]
    fn on_receive_deduplicates_by_op_id() {
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        let op = set_op("R1:1", "k", 1, "R1");
        let (was_new, changed) = r.on_receive(&op).unwrap();
        assert!(was_new && changed);
        let (was_new, changed) = r.on_receive(&op).unwrap();
        assert!(!was_new && !changed);
        assert_eq!(r.ops_received, 2);
    }

    #[test]
    fn activate_rumor_preserves_existing_budget() {
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.activate_rumor("R1:1", 10);
        r.active_rumors.insert("R1:1".into(), 3);
        r.activate_rumor("R1:1", 10);
        assert_eq!(r.active_rumors["R1:1"], 3);
    }

    #[test]
    fn pick_peer_is_deterministic_for_fixed_seed() {
        let peers = vec!["R1".to_string(), "R2".to_string(), "R3".to_string()];
        let mut a = Replica::new("R0", BTreeMap::new(), 7);
        let mut b = Replica::new("R0", BTreeMap::new(), 7);
        assert_eq!(a.pick_peer(&peers), b.pick_peer(&peers));
    }
}
