//! Scenario configuration: the knobs a run or campaign is built from.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which dissemination algorithm a scenario runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algo {
    DirectMail,
    RumorMongering,
    AntiEntropy,
}

impl Default for Algo {
    fn default() -> Self {
        Self::RumorMongering
    }
}

/// Full configuration for one simulated scenario.
///
/// Every field has a default matching the reference run, so a scenario can
/// be described by a partial TOML document that only overrides what it
/// needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub replicas: usize,
    pub ticks: u64,
    pub inject_per_tick: usize,
    pub drop_rate: f64,
    pub min_delay: u64,
    pub max_delay: u64,
    pub algo: Algo,
    pub rumor_budget: u32,
    pub rumor_fanout: usize,
    pub rumor_stop_threshold: u32,
    pub anti_entropy_interval: u64,
    pub anti_entropy_sample: usize,
    pub metrics_every: u64,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            replicas: 20,
            ticks: 800,
            inject_per_tick: 4,
            drop_rate: 0.05,
            min_delay: 1,
            max_delay: 5,
            algo: Algo::default(),
            rumor_budget: 30,
            rumor_fanout: 1,
            rumor_stop_threshold: 4,
            anti_entropy_interval: 25,
            anti_entropy_sample: 2000,
            metrics_every: 1,
            seed: 11,
        }
    }
}

impl ScenarioConfig {
    /// Load a config from a TOML file, falling back to defaults field by
    /// field for anything the file omits.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound { path: path.to_path_buf() })?;
        let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config out as TOML, matching the shape `load` accepts.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Validate ranges that serde's type system cannot enforce on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replicas == 0 {
            return Err(ConfigError::InvalidValue {
                key: "replicas".into(),
                value: self.replicas.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(ConfigError::InvalidValue {
                key: "drop_rate".into(),
                value: self.drop_rate.to_string(),
                reason: "must be between 0.0 and 1.0".into(),
            });
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::InvalidValue {
                key: "min_delay".into(),
                value: self.min_delay.to_string(),
                reason: format!("must be <= max_delay ({})", self.max_delay),
            });
        }
        if self.rumor_fanout == 0 && self.algo == Algo::RumorMongering {
            return Err(ConfigError::InvalidValue {
                key: "rumor_fanout".into(),
                value: self.rumor_fanout.to_string(),
                reason: "must be at least 1 under rumor_mongering".into(),
            });
        }
        if self.metrics_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "metrics_every".into(),
                value: self.metrics_every.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Derive the per-seed variant of this config for campaign runs: every
    /// field is shared except the seed, which is replaced.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = ScenarioConfig::default();
        assert_eq!(cfg.replicas, 20);
        assert_eq!(cfg.ticks, 800);
        assert_eq!(cfg.algo, Algo::RumorMongering);
        assert_eq!(cfg.seed, 11);
        cfg.validate().expect("defaults must validate");
    }

    #[test]
    fn zero_replicas_is_invalid() {
        let mut cfg = ScenarioConfig::default();
        cfg.replicas = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn drop_rate_out_of_range_is_invalid() {
        let mut cfg = ScenarioConfig::default();
        cfg.drop_rate = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn min_delay_above_max_delay_is_invalid() {
        let mut cfg = ScenarioConfig::default();
        cfg.min_delay = 10;
        cfg.max_delay = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let cfg: ScenarioConfig = toml::from_str("seed = 42\nticks = 100\n").expect("parse");
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.ticks, 100);
        assert_eq!(cfg.replicas, 20);
    }

    #[test]
    fn with_seed_only_changes_seed() {
        let base = ScenarioConfig::default();
        let derived = base.with_seed(999);
        assert_eq!(derived.seed, 999);
        assert_eq!(derived.replicas, base.replicas);
        assert_eq!(derived.ticks, base.ticks);
    }

    #[test]
    fn missing_config_file_errors() {
        let err = ScenarioConfig::load(Path::new("/nonexistent/epidemic-config.toml"))
            .expect_err("missing file must error");
        assert_eq!(err.error_code(), "E1003");
    }
}
