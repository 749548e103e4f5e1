#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;

use clap::{CommandFactory, Parser, Subcommand};
use output::{resolve_output_mode, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "epidemic: deterministic simulator for epidemic replica synchronization",
    long_about = None,
    after_help = "QUICK REFERENCE:\n    epidemic run --config scenario.toml       # run one scenario\n    epidemic run --algo rumor-mongering       # run with an algorithm override\n    epidemic campaign --config scenario.toml --seeds 100\n    epidemic completions bash                 # generate shell completions"
)]
struct Cli {
    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Hidden alias for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, environment, and TTY defaults.
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single scenario to completion.
    #[command(
        about = "Run a single scenario to completion",
        long_about = "Run a scenario with a given configuration, optional initial snapshot, and\n\
                      optional workload, writing metrics and final replica states to an output\n\
                      directory.",
        after_help = "EXAMPLES:\n    # Run with defaults\n    epidemic run\n\n\
                      # Run a named config with a workload file\n    epidemic run --config scenario.toml --workload ops.jsonl\n\n\
                      # Override the algorithm and write artifacts elsewhere\n    epidemic run --algo anti-entropy --out ./out\n\n\
                      # Machine-readable output\n    epidemic run --format json"
    )]
    Run(cmd::run::RunArgs),

    /// Run a scenario across a range of seeds and report convergence failures.
    #[command(
        about = "Run a scenario across a range of seeds",
        long_about = "Execute the same scenario configuration across many seeds, reporting how\n\
                      many converged and surfacing every seed that failed to reach zero residue.",
        after_help = "EXAMPLES:\n    # Run 100 seeds starting at 0\n    epidemic campaign --seeds 100\n\n\
                      # Custom seed range\n    epidemic campaign --config scenario.toml --seed-start 500 --seeds 50\n\n\
                      # Machine-readable output\n    epidemic campaign --seeds 100 --format json"
    )]
    Campaign(cmd::campaign::CampaignArgs),

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completion scripts")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EPIDEMIC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "epidemic=debug,info"
        } else {
            "epidemic=info,warn"
        })
    });

    let format = env::var("EPIDEMIC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match &cli.command {
        Commands::Run(args) => cmd::run::run(args, output),
        Commands::Campaign(args) => cmd::campaign::run(args, output),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}
