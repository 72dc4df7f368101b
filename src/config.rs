// ⚙️ Engine configuration
//
// JSON shape:
//   {
//     "footprint": { "alpha": 0.5, "beta": 0.5 },
//     "severity_threshold": { "percentile": 75 },     or { "absolute": 1.2 }
//     "contagion_threshold": 0.15,                    required
//     "max_rounds": 20,
//     "derive_cooccurrence": false
//   }

use crate::analysis::cascade::{CascadeConfig, SeverityThreshold, DEFAULT_MAX_ROUNDS};
use crate::error::RiskResult;
use crate::footprint::FootprintWeights;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub footprint: FootprintWeights,

    /// θ; defaults to the 75th percentile of bank weighted degree.
    #[serde(default)]
    pub severity_threshold: SeverityThreshold,

    /// φ. Must be given explicitly.
    pub contagion_threshold: f64,

    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Derive Service - Hazard edges when no co-occurrence table is loaded.
    #[serde(default)]
    pub derive_cooccurrence: bool,
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

impl EngineConfig {
    /// Defaults everywhere except φ.
    pub fn new(contagion_threshold: f64) -> Self {
        EngineConfig {
            footprint: FootprintWeights::default(),
            severity_threshold: SeverityThreshold::default(),
            contagion_threshold,
            max_rounds: DEFAULT_MAX_ROUNDS,
            derive_cooccurrence: false,
        }
    }

    /// Load and validate a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(content).context("Failed to parse engine config JSON")?;
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> RiskResult<()> {
        self.footprint.validate()?;
        self.cascade().validate()
    }

    pub fn cascade(&self) -> CascadeConfig {
        CascadeConfig::new(self.contagion_threshold)
            .with_severity(self.severity_threshold)
            .with_max_rounds(self.max_rounds)
    }
}

// ============================================================================
// TESTS
// ============================================================================
