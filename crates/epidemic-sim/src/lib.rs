#![forbid(unsafe_code)]
//! epidemic-sim: a deterministic, tick-driven simulator of epidemic
//! (gossip-based) replica synchronization.
//!
//! Each tick runs four phases in a fixed order: inject workload operations,
//! let the configured algorithm act, deliver ready network messages, then
//! sample metrics. See [`Simulator::run`].

pub mod algorithm;
pub mod campaign;
pub mod metrics;
pub mod network;
pub mod replica;
pub mod rng;

use std::collections::BTreeMap;

use epidemic_core::config::ScenarioConfig;
use epidemic_core::error::ScenarioError;
use epidemic_core::model::{Operation, Record, Timestamp};
use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::metrics::{residue, MetricsSample};
use crate::network::Network;
use crate::replica::Replica;
use crate::rng::DeterministicRng;
use tracing::{debug, info, instrument};

/// Totals at the end of a run, mirroring the reference implementation's
/// `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub replicas: usize,
    pub ticks: u64,
    pub workload_ops_total: usize,
    pub workload_ops_injected: usize,
    pub converged_at_tick: Option<u64>,
    pub network_msgs_sent: u64,
    pub network_msgs_dropped: u64,
    pub replica_ops_sent_total: u64,
    pub replica_ops_received_total: u64,
    pub replica_ops_applied_total: u64,
}

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub metrics: Vec<MetricsSample>,
    pub final_states: BTreeMap<String, BTreeMap<String, Record>>,
    pub summary: RunSummary,
}

/// The tick-driven engine: owns every replica, the network, and the
/// configured algorithm, and drives them through a scenario.
pub struct Simulator {
    config: ScenarioConfig,
    replicas: Vec<Replica>,
    replica_index: BTreeMap<String, usize>,
    all_ids: Vec<String>,
    network: Network,
    algorithm: Algorithm,
    op_index: BTreeMap<String, Operation>,
    workload: Vec<Operation>,
    inject_cursor: usize,
    injector_rng: DeterministicRng,
}

impl Simulator {
    /// Build a simulator from a config, an initial per-key snapshot shared
    /// (by copy) across every replica, and a workload of operations to
    /// inject over the run.
    #[must_use]
    pub fn new(
        config: ScenarioConfig,
        initial_snapshot: BTreeMap<String, Record>,
        workload: Vec<Operation>,
    ) -> Self {
        let all_ids: Vec<String> = (0..config.replicas).map(|i| format!("R{i}")).collect();
        let mut replica_index = BTreeMap::new();
        let replicas = all_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                replica_index.insert(id.clone(), i);
                Replica::new(id.clone(), initial_snapshot.clone(), config.seed * 1000 + i as u64)
            })
            .collect();

        let network = Network::new(config.seed + 1, config.drop_rate, config.min_delay, config.max_delay);
        let algorithm = Algorithm::new(
            config.algo,
            config.rumor_budget,
            config.rumor_fanout,
            config.rumor_stop_threshold,
            config.anti_entropy_interval,
            config.anti_entropy_sample,
            config.seed + 2,
        );
        let injector_rng = DeterministicRng::new(config.seed + 3);

        Self {
            config,
            replicas,
            replica_index,
            all_ids,
            network,
            algorithm,
            op_index: BTreeMap::new(),
            workload,
            inject_cursor: 0,
            injector_rng,
        }
    }

    /// Run the configured number of ticks to completion.
    #[instrument(skip(self), fields(replicas = self.config.replicas, ticks = self.config.ticks, algo = ?self.config.algo))]
    pub fn run(mut self) -> Result<RunResult, ScenarioError> {
        info!("starting scenario run");
        let workload_ops_total = self.workload.len();
        let mut metrics = Vec::new();
        let mut converged_at_tick = None;

        for tick in 0..self.config.ticks {
            self.inject(tick)?;

            for i in 0..self.replicas.len() {
                self.algorithm
                    .tick(tick, &mut self.replicas[i], &self.all_ids, &mut self.network, &self.op_index);
            }

            let ready = self.network.deliver_ready(tick);
            for delivery in ready {
                let Some(&dst_idx) = self.replica_index.get(&delivery.dst) else {
                    return Err(ScenarioError::Protocol(
                        epidemic_core::error::ProtocolError::UnknownDestinationReplica {
                            replica_id: delivery.dst,
                        },
                    ));
                };
                self.algorithm.handle_message(
                    tick,
                    &mut self.replicas[dst_idx],
                    &delivery.src,
                    delivery.payload,
                    &mut self.network,
                    &mut self.op_index,
                )?;
            }

            if tick % self.config.metrics_every == 0 {
                let stores: Vec<&BTreeMap<String, Record>> = self.replicas.iter().map(|r| &r.store).collect();
                let res = residue(&stores);
                let ops_sent: u64 = self.replicas.iter().map(|r| r.ops_sent).sum();
                metrics.push(MetricsSample {
                    tick,
                    residue: res,
                    msgs_sent: self.network.msgs_sent,
                    msgs_dropped: self.network.msgs_dropped,
                    ops_sent,
                });
                if res == 0 && converged_at_tick.is_none() && self.inject_cursor >= self.workload.len() {
                    converged_at_tick = Some(tick);
                    debug!(tick, "residue reached zero");
                }
            }
        }

        info!(converged_at = ?converged_at_tick, "scenario run complete");
        let final_states = self
            .replicas
            .iter()
            .map(|r| (r.id.clone(), r.store.clone()))
            .collect();

        let summary = RunSummary {
            replicas: self.config.replicas,
            ticks: self.config.ticks,
            workload_ops_total,
            workload_ops_injected: self.inject_cursor,
            converged_at_tick,
            network_msgs_sent: self.network.msgs_sent,
            network_msgs_dropped: self.network.msgs_dropped,
            replica_ops_sent_total: self.replicas.iter().map(|r| r.ops_sent).sum(),
            replica_ops_received_total: self.replicas.iter().map(|r| r.ops_received).sum(),
            replica_ops_applied_total: self.replicas.iter().map(|r| r.ops_applied).sum(),
        };

        Ok(RunResult {
            metrics,
            final_states,
            summary,
        })
    }

    fn inject(&mut self, tick: u64) -> Result<(), ScenarioError> {
        for _ in 0..self.config.inject_per_tick {
            if self.inject_cursor >= self.workload.len() {
                break;
            }
            let raw = self.workload[self.inject_cursor].clone();
            self.inject_cursor += 1;

            let (origin_idx, op) = match self.replica_index.get(&raw.origin) {
                Some(&idx) => (idx, raw),
                None => {
                    let idx = self.injector_rng.next_bounded(self.replicas.len() as u64) as usize;
                    let origin_id = self.replicas[idx].id.clone();
                    let new_ts = Timestamp::new(raw.ts.counter, origin_id.clone());
                    let op_id = format!("{origin_id}:{}", raw.ts.counter);
                    let op = Operation::new(op_id, raw.op, raw.key, raw.value, new_ts, origin_id);
                    (idx, op)
                }
            };

            let (was_new, _changed) = self.replicas[origin_idx].on_receive(&op)?;
            if was_new {
                self.op_index.insert(op.op_id.clone(), op.clone());
                self.algorithm.on_injected(
                    tick,
                    &mut self.replicas[origin_idx],
                    &self.all_ids,
                    &mut self.network,
                    &op,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidemic_core::model::OpKind;

    fn workload_of(n: usize) -> Vec<Operation> {
        (0..n)
            .map(|i| {
                Operation::new(
                    format!("R0:{i}"),
                    OpKind::Set,
                    format!("k{i}"),
                    Some(serde_json::json!(i)),
                    Timestamp::new(i as u64, "R0"),
                    "R0",
                )
            })
            .collect()
    }

    #[test]
    fn run_converges_to_zero_residue_with_enough_ticks() {
        let mut cfg = ScenarioConfig::default();
        cfg.replicas = 5;
        cfg.ticks = 200;
        cfg.drop_rate = 0.0;
        let result = Simulator::new(cfg, BTreeMap::new(), workload_of(10)).run().unwrap();
        assert!(result.summary.converged_at_tick.is_some());
        assert_eq!(result.metrics.last().unwrap().residue, 0);
    }

    #[test]
    fn run_applies_every_injected_op_somewhere() {
        let mut cfg = ScenarioConfig::default();
        cfg.replicas = 3;
        cfg.ticks = 50;
        cfg.inject_per_tick = 2;
        let result = Simulator::new(cfg, BTreeMap::new(), workload_of(4)).run().unwrap();
        assert_eq!(result.summary.workload_ops_injected, 4);
    }

    #[test]
    fn direct_mail_converges_quickly_with_no_drops() {
        let mut cfg = ScenarioConfig::default();
        cfg.replicas = 4;
        cfg.ticks = 20;
        cfg.drop_rate = 0.0;
        cfg.algo = epidemic_core::config::Algo::DirectMail;
        let result = Simulator::new(cfg, BTreeMap::new(), workload_of(3)).run().unwrap();
        assert_eq!(result.summary.replica_ops_applied_total, 3 * 4);
    }

    #[test]
    fn deterministic_same_seed_same_summary() {
        let workload = workload_of(20);
        let mut cfg = ScenarioConfig::default();
        cfg.replicas = 6;
        cfg.ticks = 100;

        let a = Simulator::new(cfg.clone(), BTreeMap::new(), workload.clone()).run().unwrap();
        let b = Simulator::new(cfg, BTreeMap::new(), workload).run().unwrap();

        assert_eq!(a.summary.network_msgs_sent, b.summary.network_msgs_sent);
        assert_eq!(a.summary.replica_ops_applied_total, b.summary.replica_ops_applied_total);
        assert_eq!(a.final_states, b.final_states);
    }
}
