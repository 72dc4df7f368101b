// 🦋 Biodiversity Footprint Estimator
//
//   footprint[bank] = Σ_activity exposure[bank, activity] × (α × emissions[activity] + β × landuse[activity])
//
// α and β must sum to 1. Each score is kept split into its emissions and
// land-use parts so reports can show where the footprint comes from.

use crate::aggregation::map_banks;
use crate::error::{RiskError, RiskResult};
use crate::exposure::ExposureMatrix;
use crate::reference::{ensure_same_set, IntensityTable};
use crate::supply_chain::SupplyChain;
use crate::types::{BankId, WEIGHT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// WEIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintWeights {
    /// Weight on financed emissions intensity.
    #[serde(default = "default_half")]
    pub alpha: f64,

    /// Weight on land-use intensity.
    #[serde(default = "default_half")]
    pub beta: f64,
}

fn default_half() -> f64 {
    0.5
}

impl Default for FootprintWeights {
    fn default() -> Self {
        FootprintWeights { alpha: 0.5, beta: 0.5 }
    }
}

impl FootprintWeights {
    pub fn validate(&self) -> RiskResult<()> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("footprint {}", name),
                    "weight must be finite and non-negative",
                    value,
                ));
            }
        }
        let sum = self.alpha + self.beta;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RiskError::invalid_weight(
                "footprint alpha + beta",
                "alpha and beta must sum to 1.0",
                sum,
            ));
        }
        Ok(())
    }
}

// ============================================================================
// FOOTPRINT SCORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintScore {
    pub bank: BankId,
    /// α × Σ exposure × emissions
    pub emissions_component: f64,
    /// β × Σ exposure × land use
    pub land_use_component: f64,
    pub total: f64,
    /// `total` scaled by the bank's portfolio value.
    pub financed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FootprintTable {
    scores: BTreeMap<BankId, FootprintScore>,
}

impl FootprintTable {
    pub fn get(&self, bank: &BankId) -> Option<&FootprintScore> {
        self.scores.get(bank)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FootprintScore> {
        self.scores.values()
    }

    pub fn bank_ids(&self) -> impl Iterator<Item = &BankId> {
        self.scores.keys()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn summary(&self) -> String {
        let total: f64 = self.scores.values().map(|s| s.total).sum();
        let max = self
            .scores
            .values()
            .max_by(|a, b| a.total.total_cmp(&b.total).then_with(|| b.bank.cmp(&a.bank)));
        match max {
            Some(top) => format!(
                "Footprint: {} banks, mean {:.4}, highest {} ({:.4})",
                self.scores.len(),
                total / self.scores.len() as f64,
                top.bank,
                top.total
            ),
            None => "Footprint: no banks".to_string(),
        }
    }
}

// ============================================================================
// ESTIMATOR
// ============================================================================

pub struct FootprintEstimator<'a> {
    weights: FootprintWeights,
    supply_chain: Option<&'a SupplyChain>,
}

impl<'a> FootprintEstimator<'a> {
    /// Estimator with the default 0.5 / 0.5 weights.
    pub fn new() -> Self {
        FootprintEstimator {
            weights: FootprintWeights::default(),
            supply_chain: None,
        }
    }

    pub fn with_weights(weights: FootprintWeights) -> RiskResult<Self> {
        weights.validate()?;
        Ok(FootprintEstimator {
            weights,
            supply_chain: None,
        })
    }

    /// Use upstream-inclusive intensities.
    pub fn supply_chain(mut self, chain: &'a SupplyChain) -> Self {
        self.supply_chain = Some(chain);
        self
    }

    pub fn estimate(
        &self,
        exposure: &ExposureMatrix,
        emissions: &IntensityTable,
        land_use: &IntensityTable,
    ) -> RiskResult<FootprintTable> {
        self.weights.validate()?;
        exposure.validate()?;
        ensure_same_set(
            "exposure vs emissions activities",
            exposure.activities(),
            emissions.activities(),
        )?;
        ensure_same_set(
            "exposure vs land-use activities",
            exposure.activities(),
            land_use.activities(),
        )?;

        let (emissions, land_use) = match self.supply_chain {
            Some(chain) => (
                chain.upstream_intensity("emissions", emissions)?,
                chain.upstream_intensity("land use", land_use)?,
            ),
            None => (emissions.clone(), land_use.clone()),
        };

        let FootprintWeights { alpha, beta } = self.weights;
        let scores = map_banks(exposure, |bank| {
            let (mut ghg, mut lu) = (0.0, 0.0);
            for (activity, weight) in bank.exposures() {
                ghg += weight * emissions.get(activity).unwrap_or(0.0);
                lu += weight * land_use.get(activity).unwrap_or(0.0);
            }
            let emissions_component = alpha * ghg;
            let land_use_component = beta * lu;
            let total = emissions_component + land_use_component;
            FootprintScore {
                bank: bank.id.clone(),
                emissions_component,
                land_use_component,
                total,
                financed: total * bank.portfolio_value,
            }
        });

        let table = FootprintTable {
            scores: scores.into_iter().map(|s| (s.bank.clone(), s)).collect(),
        };
        info!(banks = table.len(), alpha, beta, "Footprint estimated");
        Ok(table)
    }
}

impl Default for FootprintEstimator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
