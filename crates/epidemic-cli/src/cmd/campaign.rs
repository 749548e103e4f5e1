//! `epidemic campaign` — run a scenario across a range of seeds.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Args;
use epidemic_core::config::ScenarioConfig;
use epidemic_sim::campaign::{CampaignConfig, CampaignReport};

use crate::cmd::run::{load_snapshot, load_workload};
use crate::cmd::AlgoArg;
use crate::output::{pretty_kv, pretty_section, render_scenario_error, OutputMode};

/// Arguments for `epidemic campaign`.
#[derive(Args, Debug)]
pub struct CampaignArgs {
    /// Path to a TOML scenario config shared across every seed.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a JSON object mapping key to an initial Record.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Path to a JSONL workload file injected identically in every seed.
    #[arg(long)]
    pub workload: Option<PathBuf>,

    /// Override the dissemination algorithm from the config file.
    #[arg(long, value_enum)]
    pub algo: Option<AlgoArg>,

    /// Override the number of replicas from the config file.
    #[arg(long)]
    pub replicas: Option<usize>,

    /// Override the number of ticks from the config file.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Number of seeds to run.
    #[arg(long, default_value = "100")]
    pub seeds: u64,

    /// Starting seed value.
    #[arg(long, default_value = "0")]
    pub seed_start: u64,

    /// Treat a seed that never reaches zero residue as a failure.
    #[arg(long, default_value = "true")]
    pub require_convergence: bool,
}

fn build_campaign(args: &CampaignArgs) -> Result<CampaignConfig, epidemic_core::error::ScenarioError> {
    let mut base = match &args.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    if let Some(algo) = args.algo {
        base.algo = algo.into();
    }
    if let Some(replicas) = args.replicas {
        base.replicas = replicas;
    }
    if let Some(ticks) = args.ticks {
        base.ticks = ticks;
    }
    base.validate()?;

    let mut campaign = CampaignConfig::new(base, args.seed_start, args.seeds);
    campaign.require_convergence = args.require_convergence;
    Ok(campaign)
}

fn print_report(report: &CampaignReport, campaign: &CampaignConfig, output: OutputMode) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputMode::Text => {
            println!(
                "campaign seeds_run={} replicas={} ticks={} algo={:?}",
                report.seeds_run, campaign.base.replicas, campaign.base.ticks, campaign.base.algo
            );
            println!(
                "results passed={} failed={} all_passed={}",
                report.seeds_passed,
                report.failures.len(),
                report.all_passed()
            );
            for failure in report.failures.iter().take(5) {
                println!("failure seed={} reason={}", failure.seed, failure.reason);
            }
            if report.failures.len() > 5 {
                println!("failures_truncated count={}", report.failures.len() - 5);
            }
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, "Scenario Campaign")?;
            pretty_kv(&mut w, "Seeds", report.seeds_run.to_string())?;
            pretty_kv(&mut w, "Replicas", campaign.base.replicas.to_string())?;
            pretty_kv(&mut w, "Ticks", campaign.base.ticks.to_string())?;
            pretty_kv(&mut w, "Algorithm", format!("{:?}", campaign.base.algo))?;
            pretty_kv(
                &mut w,
                "Results",
                format!("{} passed / {} failed", report.seeds_passed, report.failures.len()),
            )?;
            if report.all_passed() {
                pretty_kv(&mut w, "Status", "all seeds converged")?;
            } else {
                pretty_kv(
                    &mut w,
                    "Status",
                    format!(
                        "{} failures (first at seed {})",
                        report.failures.len(),
                        report.first_failure.as_ref().map_or(0, |f| f.seed)
                    ),
                )?;
                println!();
                pretty_section(&mut w, "Failure Samples")?;
                for failure in report.failures.iter().take(5) {
                    println!("seed {:<8} reason={}", failure.seed, failure.reason);
                }
                if report.failures.len() > 5 {
                    println!("... and {} more failures", report.failures.len() - 5);
                }
            }
        }
    }
    Ok(())
}

/// Execute `epidemic campaign`.
pub fn run(args: &CampaignArgs, output: OutputMode) -> Result<()> {
    let campaign = match build_campaign(args) {
        Ok(c) => c,
        Err(err) => {
            render_scenario_error(output, &err)?;
            process::exit(1);
        }
    };

    let snapshot = match &args.snapshot {
        Some(path) => match load_snapshot(path) {
            Ok(s) => s,
            Err(err) => {
                render_scenario_error(output, &err)?;
                process::exit(1);
            }
        },
        None => BTreeMap::new(),
    };

    let workload = match &args.workload {
        Some(path) => match load_workload(path) {
            Ok(w) => w,
            Err(err) => {
                render_scenario_error(output, &err)?;
                process::exit(1);
            }
        },
        None => Vec::new(),
    };

    let report = epidemic_sim::campaign::run_campaign(&campaign, &snapshot, &workload);
    print_report(&report, &campaign, output)?;

    if !report.all_passed() {
        process::exit(1);
    }

    Ok(())
}
