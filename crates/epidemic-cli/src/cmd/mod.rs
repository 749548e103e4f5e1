pub mod campaign;
pub mod completions;
pub mod run;

use clap::ValueEnum;
use epidemic_core::config::Algo;

/// CLI-facing mirror of [`Algo`] so `clap` can derive `--algo` parsing
/// without epidemic-core depending on clap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgoArg {
    DirectMail,
    RumorMongering,
    AntiEntropy,
}

impl From<AlgoArg> for Algo {
    fn from(arg: AlgoArg) -> Self {
        match arg {
            AlgoArg::DirectMail => Algo::DirectMail,
            AlgoArg::RumorMongering => Algo::RumorMongering,
            AlgoArg::AntiEntropy => Algo::AntiEntropy,
        }
    }
}
