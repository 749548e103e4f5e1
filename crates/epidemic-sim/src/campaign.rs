//! Running a scenario across many seeds and reporting the first failure.

use epidemic_core::config::ScenarioConfig;
use epidemic_core::model::{Operation, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{RunSummary, Simulator};

/// Seed range and pass/fail criteria for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub base: ScenarioConfig,
    pub seed_start: u64,
    pub seed_count: u64,
    /// A run fails the campaign if it never reaches zero residue.
    pub require_convergence: bool,
}

impl CampaignConfig {
    #[must_use]
    pub fn new(base: ScenarioConfig, seed_start: u64, seed_count: u64) -> Self {
        Self {
            base,
            seed_start,
            seed_count,
            require_convergence: true,
        }
    }

    pub fn seeds(&self) -> impl Iterator<Item = u64> + '_ {
        self.seed_start..self.seed_start + self.seed_count
    }
}

/// A single seed's failure to converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub reason: String,
    pub summary: RunSummary,
}

/// Outcome of running a campaign across its whole seed range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: u64,
    pub seeds_passed: u64,
    pub first_failure: Option<SeedFailure>,
    pub failures: Vec<SeedFailure>,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every seed in `campaign`'s range against a fresh snapshot/workload
/// pair, collecting every failure (not just the first) so the report can
/// show how widespread an issue is.
pub fn run_campaign(
    campaign: &CampaignConfig,
    initial_snapshot: &BTreeMap<String, Record>,
    workload: &[Operation],
) -> CampaignReport {
    let mut seeds_run = 0;
    let mut seeds_passed = 0;
    let mut failures = Vec::new();

    for seed in campaign.seeds() {
        seeds_run += 1;
        let cfg = campaign.base.with_seed(seed);
        let result = Simulator::new(cfg, initial_snapshot.clone(), workload.to_vec()).run();

        match result {
            Ok(run) => {
                let converged = run.summary.converged_at_tick.is_some();
                if !campaign.require_convergence || converged {
                    seeds_passed += 1;
                } else {
                    failures.push(SeedFailure {
                        seed,
                        reason: "residue never reached zero after workload was fully injected".into(),
                        summary: run.summary,
                    });
                }
            }
            Err(err) => {
                failures.push(SeedFailure {
                    seed,
                    reason: err.to_string(),
                    summary: RunSummary {
                        replicas: campaign.base.replicas,
                        ticks: campaign.base.ticks,
                        workload_ops_total: workload.len(),
                        workload_ops_injected: 0,
                        converged_at_tick: None,
                        network_msgs_sent: 0,
                        network_msgs_dropped: 0,
                        replica_ops_sent_total: 0,
                        replica_ops_received_total: 0,
                        replica_ops_applied_total: 0,
                    },
                });
            }
        }
    }

    CampaignReport {
        seeds_run,
        seeds_passed,
        first_failure: failures.first().cloned(),
        failures,
    }
}
