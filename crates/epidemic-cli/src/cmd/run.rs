//! `epidemic run` — execute a single scenario to completion.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::Args;
use epidemic_core::config::ScenarioConfig;
use epidemic_core::error::{IoError, ScenarioError};
use epidemic_core::model::{Operation, Record};
use epidemic_sim::Simulator;

use crate::cmd::AlgoArg;
use crate::output::{pretty_kv, pretty_section, render_scenario_error, OutputMode};

/// Arguments for `epidemic run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a TOML scenario config. Omit to run with defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a JSON object mapping key to an initial Record, shared
    /// (by copy) across every replica at tick 0.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Path to a JSONL file of Operations injected over the run, one per
    /// non-empty line.
    #[arg(long)]
    pub workload: Option<PathBuf>,

    /// Directory to write config.json, metrics.jsonl, final_states/, and
    /// summary.json into. Omit to skip writing artifacts.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Override the dissemination algorithm from the config file.
    #[arg(long, value_enum)]
    pub algo: Option<AlgoArg>,

    /// Override the number of replicas from the config file.
    #[arg(long)]
    pub replicas: Option<usize>,

    /// Override the number of ticks from the config file.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Override the RNG seed from the config file.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the per-send drop probability from the config file.
    #[arg(long)]
    pub drop_rate: Option<f64>,
}

fn load_config(args: &RunArgs) -> Result<ScenarioConfig, ScenarioError> {
    let mut cfg = match &args.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    if let Some(algo) = args.algo {
        cfg.algo = algo.into();
    }
    if let Some(replicas) = args.replicas {
        cfg.replicas = replicas;
    }
    if let Some(ticks) = args.ticks {
        cfg.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(drop_rate) = args.drop_rate {
        cfg.drop_rate = drop_rate;
    }
    cfg.validate()?;
    Ok(cfg)
}

pub(crate) fn load_snapshot(path: &Path) -> Result<BTreeMap<String, Record>, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ScenarioError::Io(IoError::Generic {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    serde_json::from_str(&content)
        .map_err(|e| {
            IoError::SnapshotParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
        .map_err(ScenarioError::Io)
}

pub(crate) fn load_workload(path: &Path) -> Result<Vec<Operation>, ScenarioError> {
    let file = fs::File::open(path).map_err(|e| {
        ScenarioError::Io(IoError::Generic {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    let reader = BufReader::new(file);
    let mut ops = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            ScenarioError::Io(IoError::Generic {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let op: Operation = serde_json::from_str(&line).map_err(|e| {
            ScenarioError::Io(IoError::WorkloadParseFailed {
                path: path.to_path_buf(),
                line: i + 1,
                reason: e.to_string(),
            })
        })?;
        ops.push(op);
    }
    Ok(ops)
}

fn write_artifacts(
    out_dir: &Path,
    config: &ScenarioConfig,
    result: &epidemic_sim::RunResult,
) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join("config.json"), serde_json::to_string_pretty(config)?)?;

    let mut metrics_file = fs::File::create(out_dir.join("metrics.jsonl"))?;
    for sample in &result.metrics {
        writeln!(metrics_file, "{}", serde_json::to_string(sample)?)?;
    }

    let states_dir = out_dir.join("final_states");
    fs::create_dir_all(&states_dir)?;
    for (replica_id, store) in &result.final_states {
        fs::write(
            states_dir.join(format!("{replica_id}.json")),
            serde_json::to_string_pretty(store)?,
        )?;
    }

    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_string_pretty(&result.summary)?,
    )?;
    Ok(())
}

/// Execute `epidemic run`.
pub fn run(args: &RunArgs, output: OutputMode) -> Result<()> {
    let config = match load_config(args) {
        Ok(cfg) => cfg,
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

    let result = match Simulator::new(config.clone(), snapshot, workload).run() {
        Ok(result) => result,
        Err(err) => {
            render_scenario_error(output, &err)?;
            process::exit(1);
        }
    };

    if let Some(out_dir) = &args.out {
        write_artifacts(out_dir, &config, &result)?;
    }

    let last_residue = result.metrics.last().map_or(0, |m| m.residue);

    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&result.summary)?);
        }
        OutputMode::Text => {
            println!(
                "run replicas={} ticks={} algo={:?} seed={}",
                config.replicas, config.ticks, config.algo, config.seed
            );
            println!(
                "result converged_at={:?} residue={} msgs_sent={} msgs_dropped={} ops_applied={}",
                result.summary.converged_at_tick,
                last_residue,
                result.summary.network_msgs_sent,
                result.summary.network_msgs_dropped,
                result.summary.replica_ops_applied_total,
            );
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, "Scenario Run")?;
            pretty_kv(&mut w, "Replicas", config.replicas.to_string())?;
            pretty_kv(&mut w, "Ticks", config.ticks.to_string())?;
            pretty_kv(&mut w, "Algorithm", format!("{:?}", config.algo))?;
            pretty_kv(&mut w, "Seed", config.seed.to_string())?;
            pretty_kv(&mut w, "Workload ops", result.summary.workload_ops_total.to_string())?;
            pretty_kv(
                &mut w,
                "Converged",
                match result.summary.converged_at_tick {
                    Some(tick) => format!("yes, at tick {tick}"),
                    None => "no".into(),
                },
            )?;
            pretty_kv(&mut w, "Final residue", last_residue.to_string())?;
            pretty_kv(&mut w, "Messages sent", result.summary.network_msgs_sent.to_string())?;
            pretty_kv(&mut w, "Messages dropped", result.summary.network_msgs_dropped.to_string())?;
            if let Some(out_dir) = &args.out {
                pretty_kv(&mut w, "Artifacts", out_dir.display().to_string())?;
            }
        }
    }

    if result.summary.converged_at_tick.is_none() {
        process::exit(1);
    }

    Ok(())
}
