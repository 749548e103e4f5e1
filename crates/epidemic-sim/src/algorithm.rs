//! The three dissemination strategies a scenario can run under.
//!
//! Each variant owns its message vocabulary: a replica running
//! `DirectMail` never produces a `Digest`, and one running `AntiEntropy`
//! never produces an `Op`. A message a variant doesn't recognize is a
//! protocol error, not something to silently ignore.

use std::collections::BTreeMap;

use epidemic_core::config::Algo;
use epidemic_core::error::ProtocolError;
use epidemic_core::merge::wins;
use epidemic_core::model::{Operation, Record};

use crate::network::{AckStatus, Message, Network};
use crate::replica::Replica;
use crate::rng::DeterministicRng;

/// A configured dissemination strategy, bundling the knobs each variant
/// needs. Only the fields relevant to `kind` are ever read.
pub struct Algorithm {
    pub kind: Algo,
    pub rumor_budget: u32,
    pub rumor_fanout: usize,
    pub rumor_stop_threshold: u32,
    pub anti_entropy_interval: u64,
    pub anti_entropy_sample: usize,
    rng: DeterministicRng,
}

impl Algorithm {
    #[must_use]
    pub fn new(
        kind: Algo,
        rumor_budget: u32,
        rumor_fanout: usize,
        rumor_stop_threshold: u32,
        anti_entropy_interval: u64,
        anti_entropy_sample: usize,
        seed: u64,
    ) -> Self {
        Self {
            kind,
            rumor_budget,
            rumor_fanout,
            rumor_stop_threshold,
            anti_entropy_interval,
            anti_entropy_sample,
            rng: DeterministicRng::new(seed),
        }
    }

    /// Peers eligible to receive from `replica_id`: everyone but itself.
    fn peers_of<'a>(all_ids: &'a [String], replica_id: &str) -> Vec<String> {
        all_ids.iter().filter(|id| id.as_str() != replica_id).cloned().collect()
    }

    /// Called once per replica per tick, before message delivery.
    pub fn tick(
        &mut self,
        now: u64,
        replica: &mut Replica,
        all_ids: &[String],
        net: &mut Network,
        op_index: &BTreeMap<String, Operation>,
    ) {
        match self.kind {
            Algo::DirectMail => {}
            Algo::RumorMongering => self.rumor_tick(now, replica, all_ids, net, op_index),
            Algo::AntiEntropy => self.anti_entropy_tick(now, replica, all_ids, net),
        }
    }

    /// A new local write: under direct mail, broadcast immediately to
    /// every peer. Under rumor mongering, start gossiping it. Under
    /// anti-entropy, do nothing — it propagates on the next digest round.
    pub fn on_injected(
        &mut self,
        now: u64,
        replica: &mut Replica,
        all_ids: &[String],
        net: &mut Network,
        op: &Operation,
    ) {
        match self.kind {
            Algo::DirectMail => {
                for dst in Self::peers_of(all_ids, &replica.id) {
                    net.send(now, &replica.id, &dst, Message::Op(op.clone()));
                    replica.ops_sent += 1;
                }
            }
            Algo::RumorMongering => {
                replica.activate_rumor(&op.op_id, self.rumor_budget);
            }
            Algo::AntiEntropy => {}
        }
    }

    fn rumor_tick(
        &mut self,
        now: u64,
        replica: &mut Replica,
        all_ids: &[String],
        net: &mut Network,
        op_index: &BTreeMap<String, Operation>,
    ) {
        let peers = Self::peers_of(all_ids, &replica.id);
        if peers.is_empty() {
            return;
        }
        // Snapshot the active op ids before mutating the map inside the loop.
        let active_op_ids: Vec<String> = replica.active_rumors.keys().cloned().collect();
        for op_id in active_op_ids {
            let Some(&budget) = replica.active_rumors.get(&op_id) else {
                continue;
            };
            if budget == 0 {
                replica.active_rumors.remove(&op_id);
                replica.rumor_seen_hits.remove(&op_id);
                continue;
            }
            let Some(op) = op_index.get(&op_id) else {
                replica.active_rumors.remove(&op_id);
                replica.rumor_seen_hits.remove(&op_id);
                continue;
            };
            let op = op.clone();
            for _ in 0..self.rumor_fanout {
                let dst = replica.pick_peer(&peers).to_string();
                net.send(now, &replica.id, &dst, Message::Op(op.clone()));
                replica.ops_sent += 1;
            }
            replica.active_rumors.insert(op_id.clone(), budget - 1);
            let hits = replica.rumor_seen_hits.get(&op_id).copied().unwrap_or(0);
            if hits >= self.rumor_stop_threshold {
                replica.active_rumors.remove(&op_id);
                replica.rumor_seen_hits.remove(&op_id);
            }
        }
    }

    fn anti_entropy_tick(&mut self, now: u64, replica: &mut Replica, all_ids: &[String], net: &mut Network) {
        if self.anti_entropy_interval == 0 || now % self.anti_entropy_interval != 0 {
            return;
        }
        let peers = Self::peers_of(all_ids, &replica.id);
        if peers.is_empty() {
            return;
        }
        let keys: Vec<String> = replica.store.keys().cloned().collect();
        if keys.is_empty() {
            return;
        }
        let dst = replica.pick_peer(&peers).to_string();
        let sampled = self.sample_keys(keys);
        let items = sampled
            .into_iter()
            .map(|k| {
                let ts = replica.store[&k].ts.clone();
                (k, ts)
            })
            .collect();
        net.send(now, &replica.id, &dst, Message::Digest { items });
        replica.ops_sent += 1;
    }

    /// Sample without replacement, matching the configured `anti_entropy_sample`
    /// cap. Keys are sorted first so the sample only depends on the seed and
    /// the key set, not on map iteration order.
    fn sample_keys(&mut self, mut keys: Vec<String>) -> Vec<String> {
        keys.sort_unstable();
        if keys.len() <= self.anti_entropy_sample {
            return keys;
        }
        let n = keys.len();
        for i in 0..self.anti_entropy_sample {
            let j = i + self.rng.next_bounded((n - i) as u64) as usize;
            keys.swap(i, j);
        }
        keys.truncate(self.anti_entropy_sample);
        keys
    }

    /// Apply a delivered message to `replica`, replying over `net` as needed.
    pub fn handle_message(
        &mut self,
        now: u64,
        replica: &mut Replica,
        src_id: &str,
        payload: Message,
        net: &mut Network,
        op_index: &mut BTreeMap<String, Operation>,
    ) -> Result<(), ProtocolError> {
        match (self.kind, payload) {
            (Algo::DirectMail, Message::Op(op)) => {
                let (was_new, _changed) = replica.on_receive(&op)?;
                if was_new {
                    op_index.entry(op.op_id.clone()).or_insert(op);
                }
                Ok(())
            }
            (Algo::RumorMongering, Message::Op(op)) => {
                let (was_new, _changed) = replica.on_receive(&op)?;
                let status = if was_new { AckStatus::New } else { AckStatus::Seen };
                net.send(
                    now,
                    &replica.id,
                    src_id,
                    Message::Ack {
                        op_id: op.op_id.clone(),
                        status,
                    },
                );
                replica.ops_sent += 1;
                if was_new {
                    op_index.entry(op.op_id.clone()).or_insert_with(|| op.clone());
                    replica.activate_rumor(&op.op_id, self.rumor_budget);
                }
                Ok(())
            }
            (Algo::RumorMongering, Message::Ack { op_id, status }) => {
                if matches!(status, AckStatus::Seen) {
                    *replica.rumor_seen_hits.entry(op_id).or_insert(0) += 1;
                }
                Ok(())
            }
            (Algo::AntiEntropy, Message::Digest { items }) => {
                let mut resp_items = Vec::new();
                for (key, their_ts) in items {
                    if let Some(ours) = replica.store.get(&key) {
                        if ours.ts > their_ts {
                            resp_items.push((key, ours.clone()));
                        }
                    }
                }
                net.send(now, &replica.id, src_id, Message::Records { items: resp_items });
                replica.ops_sent += 1;
                Ok(())
            }
            (Algo::AntiEntropy, Message::Records { items }) => {
                for (key, rec) in items {
                    let current_ts = replica.store.get(&key).map(|r| &r.ts);
                    if wins(current_ts, &rec.ts) {
                        replica.store.insert(key, rec);
                        replica.ops_applied += 1;
                    }
                }
                Ok(())
            }
            (kind, other) => Err(ProtocolError::UnknownMessageKind {
                kind: format!("{kind:?} does not handle {}", message_kind_name(&other)),
            }),
        }
    }
}

fn message_kind_name(msg: &Message) -> &'static str {
    match msg {
        Message::Op(_) => "OP",
        Message::Ack { .. } => "ACK",
        Message::Digest { .. } => "DIGEST",
        Message::Records { .. } => "RECORDS",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidemic_core::model::{OpKind, Timestamp};
    use std::collections::BTreeMap;

    fn op(id: &str, counter: u64, origin: &str) -> Operation {
        Operation::new(
            id,
            OpKind::Set,
            "k",
            Some(serde_json::json!(counter)),
            Timestamp::new(counter, origin),
            origin,
        )
    }

    fn algo(kind: Algo) -> Algorithm {
        Algorithm::new(kind, 30, 1, 4, 25, 2000, 99)
    }

    #[test]
    fn direct_mail_broadcasts_to_all_peers_on_injection() {
        let mut a = algo(Algo::DirectMail);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        let mut net = Network::new(1, 0.0, 0, 0);
        let ids = vec!["R0".into(), "R1".into(), "R2".into()];
        a.on_injected(0, &mut r, &ids, &mut net, &op("R0:1", 1, "R0"));
        assert_eq!(net.pending_len(), 2);
        assert_eq!(r.ops_sent, 2);
    }

    #[test]
    fn direct_mail_unknown_message_is_protocol_error() {
        let mut a = algo(Algo::DirectMail);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        let mut net = Network::new(1, 0.0, 0, 0);
        let mut idx = BTreeMap::new();
        let result = a.handle_message(
            0,
            &mut r,
            "R1",
            Message::Digest { items: vec![] },
            &mut net,
            &mut idx,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rumor_tick_decrements_budget_and_sends() {
        let mut a = algo(Algo::RumorMongering);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.activate_rumor("R0:1", 2);
        let mut idx = BTreeMap::new();
        idx.insert("R0:1".to_string(), op("R0:1", 1, "R0"));
        let mut net = Network::new(1, 0.0, 0, 0);
        let ids = vec!["R0".into(), "R1".into()];
        a.rumor_tick(0, &mut r, &ids, &mut net, &idx);
        assert_eq!(r.active_rumors["R0:1"], 1);
        assert_eq!(net.pending_len(), 1);
    }

    #[test]
    fn rumor_retires_after_stop_threshold_seen_hits() {
        let mut a = algo(Algo::RumorMongering);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.activate_rumor("R0:1", 10);
        r.rumor_seen_hits.insert("R0:1".to_string(), 4);
        let mut idx = BTreeMap::new();
        idx.insert("R0:1".to_string(), op("R0:1", 1, "R0"));
        let mut net = Network::new(1, 0.0, 0, 0);
        let ids = vec!["R0".into(), "R1".into()];
        a.rumor_tick(0, &mut r, &ids, &mut net, &idx);
        assert!(!r.active_rumors.contains_key("R0:1"));
    }

    #[test]
    fn anti_entropy_only_ticks_on_interval_boundary() {
        let mut a = algo(Algo::AntiEntropy);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.store.insert("k".into(), Record::set(serde_json::json!(1), Timestamp::new(1, "R0")));
        let mut net = Network::new(1, 0.0, 0, 0);
        let ids = vec!["R0".into(), "R1".into()];
        a.anti_entropy_tick(1, &mut r, &ids, &mut net);
        assert_eq!(net.pending_len(), 0);
        a.anti_entropy_tick(25, &mut r, &ids, &mut net);
        assert_eq!(net.pending_len(), 1);
    }

    #[test]
    fn anti_entropy_records_apply_only_if_newer() {
        let mut a = algo(Algo::AntiEntropy);
        let mut r = Replica::new("R0", BTreeMap::new(), 1);
        r.store.insert("k".into(), Record::set(serde_json::json!(1), Timestamp::new(5, "R0")));
        let mut net = Network::new(1, 0.0, 0, 0);
        let mut idx = BTreeMap::new();
        let stale = Record::set(serde_json::json!(9), Timestamp::new(1, "R1"));
        a.handle_message(
            0,
            &mut r,
            "R1",
            Message::Records { items: vec![("k".into(), stale)] },
            &mut net,
            &mut idx,
        )
        .unwrap();
        assert_eq!(r.store["k"].ts.counter, 5);
    }
}
