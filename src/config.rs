//! Runtime configuration for the core, loaded from TOML/env via the `config`
//! crate and validated before use.
//!
//! The validation pass follows the same shape as a production node's
//! startup config check: collect warnings and errors separately, log them,
//! and let the caller decide whether to proceed on warnings alone.

use crate::types::{ChainType, ConsensusAlgorithm, OracleDataType, ProofScheme, ThresholdScheme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusAlgorithmChoice {
    Auto,
    Pbft,
    Hotstuff,
    Weighted,
}

impl ConsensusAlgorithmChoice {
    pub fn resolve(self, n_chains: usize, weights_meaningful: bool) -> ConsensusAlgorithm {
        match self {
            ConsensusAlgorithmChoice::Pbft => ConsensusAlgorithm::Pbft,
            ConsensusAlgorithmChoice::Hotstuff => ConsensusAlgorithm::HotStuff,
            ConsensusAlgorithmChoice::Weighted => ConsensusAlgorithm::Weighted,
            ConsensusAlgorithmChoice::Auto => {
                if weights_meaningful {
                    ConsensusAlgorithm::Weighted
                } else if n_chains <= 4 {
                    ConsensusAlgorithm::HotStuff
                } else {
                    ConsensusAlgorithm::Pbft
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSignatureConfig {
    pub scheme: ThresholdScheme,
    pub group_id: String,
    pub t: u32,
    pub n: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub participating_chains: Vec<ChainType>,
    pub consensus_algorithm: ConsensusAlgorithmChoice,
    pub consensus_threshold: f64,
    pub timeout_seconds: u64,
    pub max_concurrent_consensus: usize,
    pub connection_timeout_s: u64,
    pub max_retry_attempts: u32,
    pub health_check_interval_s: u64,
    pub retry_backoff_seconds: Vec<u64>,
    pub oracle_deviation_threshold_by_type: BTreeMap<OracleDataType, f64>,
    pub oracle_freshness_window_by_type: BTreeMap<OracleDataType, u64>,
    pub threshold_signature: Option<ThresholdSignatureConfig>,
    pub proof_backend: ProofScheme,
}

impl Default for Config {
    fn default() -> Self {
        let mut deviation = BTreeMap::new();
        deviation.insert(OracleDataType::Price, 0.02);
        deviation.insert(OracleDataType::Weather, 0.05);
        deviation.insert(OracleDataType::Sports, 0.05);
        deviation.insert(OracleDataType::Custom, 0.05);

        let mut freshness = BTreeMap::new();
        freshness.insert(OracleDataType::Price, 300);
        freshness.insert(OracleDataType::Weather, 1800);
        freshness.insert(OracleDataType::Sports, 120);
        freshness.insert(OracleDataType::Custom, 300);

        Self {
            participating_chains: vec![ChainType::Ethereum, ChainType::Polygon, ChainType::Solana],
            consensus_algorithm: ConsensusAlgorithmChoice::Auto,
            consensus_threshold: 2.0 / 3.0,
            timeout_seconds: 30,
            max_concurrent_consensus: 50,
            connection_timeout_s: 10,
            max_retry_attempts: 3,
            health_check_interval_s: 30,
            retry_backoff_seconds: vec![1, 5, 15, 60],
            oracle_deviation_threshold_by_type: deviation,
            oracle_freshness_window_by_type: freshness,
            threshold_signature: None,
            proof_backend: ProofScheme::Hash,
        }
    }
}

/// Accumulated warnings/errors from a config validation pass, mirroring the
/// two-bucket report a node emits at startup before refusing to boot.
#[derive(Debug, Clone, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log_summary(&self) {
        for w in &self.warnings {
            tracing::warn!(target: "trustwrapper_core::config", "{w}");
        }
        for e in &self.errors {
            tracing::error!(target: "trustwrapper_core::config", "{e}");
        }
        if self.is_valid() {
            tracing::info!(target: "trustwrapper_core::config", "configuration valid ({} warning(s))", self.warnings.len());
        }
    }
}

/// Loads configuration layering defaults < TOML file < environment
/// overrides (`TRUSTWRAPPER__*`), using the same `config` crate idiom as a
/// server that reads a base file plus env for deployment-specific knobs.
pub fn load_config(path: Option<&str>) -> Result<Config, config::ConfigError> {
    let defaults = Config::default();
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&defaults)?);

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TRUSTWRAPPER")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

pub fn validate_config(cfg: &Config) -> ConfigValidation {
    let mut v = ConfigValidation::default();

    if cfg.participating_chains.is_empty() {
        v.add_error("participating_chains must not be empty");
    }
    if cfg.participating_chains.len() == 1 {
        v.add_error("consensus requires n >= 2 participating chains (n=1 is not permitted)");
    }

    if !(0.0..=1.0).contains(&cfg.consensus_threshold) {
        v.add_error(format!(
            "consensus_threshold {} out of range [0,1]",
            cfg.consensus_threshold
        ));
    } else if cfg.consensus_threshold < 0.5 {
        v.add_warning("consensus_threshold below 0.5 weakens Byzantine tolerance guarantees");
    }

    if cfg.timeout_seconds == 0 {
        v.add_error("timeout_seconds must be > 0");
    }
    if cfg.max_concurrent_consensus == 0 {
        v.add_error("max_concurrent_consensus must be > 0");
    }
    if cfg.retry_backoff_seconds.is_empty() {
        v.add_error("retry_backoff_seconds must not be empty");
    }
    if cfg.max_retry_attempts == 0 {
        v.add_warning("max_retry_attempts=0 disables reconnection entirely");
    }

    for (ty, threshold) in &cfg.oracle_deviation_threshold_by_type {
        if *threshold <= 0.0 {
            v.add_error(format!("oracle deviation threshold for {ty:?} must be > 0"));
        }
    }

    if let Some(ts) = &cfg.threshold_signature {
        if ts.t == 0 || ts.t > ts.n {
            v.add_error(format!(
                "threshold signature config invalid: t={} n={}",
                ts.t, ts.n
            ));
        }
        if ts.n < 3 {
            v.add_warning("threshold signature group smaller than 3 offers little fault tolerance");
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        let v = validate_config(&cfg);
        assert!(v.is_valid(), "errors: {:?}", v.errors);
    }

    #[test]
    fn single_chain_is_rejected() {
        let mut cfg = Config::default();
        cfg.participating_chains = vec![ChainType::Ethereum];
        let v = validate_config(&cfg);
        assert!(!v.is_valid());
    }

    #[test]
    fn bad_threshold_signature_group_errors() {
        let mut cfg = Config::default();
        cfg.threshold_signature = Some(ThresholdSignatureConfig {
            scheme: ThresholdScheme::Schnorr,
            group_id: "g1".into(),
            t: 5,
            n: 4,
        });
        let v = validate_config(&cfg);
        assert!(!v.is_valid());
    }
}
