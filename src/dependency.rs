// 🌿 Dependency Assessment Engine
//
//   dependency[bank, service] = Σ_activity exposure[bank, activity] × coefficient[activity, service]
//
// Scores are clamped into [0, 1]; overflow from rounding is not an error.

use crate::aggregation::weighted_unit_scores;
use crate::error::RiskResult;
use crate::exposure::ExposureMatrix;
use crate::reference::{ensure_same_set, Matrix, ServiceCoefficients};
use crate::supply_chain::SupplyChain;
use crate::types::{BankId, ServiceId};
use tracing::info;

/// Bank x ecosystem service dependency scores in [0, 1].
pub type DependencyMatrix = Matrix<BankId, ServiceId>;

pub struct DependencyEngine<'a> {
    /// Optional upstream adjustment applied to coefficients before aggregation.
    supply_chain: Option<&'a SupplyChain>,
}

impl<'a> DependencyEngine<'a> {
    pub fn new() -> Self {
        DependencyEngine { supply_chain: None }
    }

    pub fn with_supply_chain(supply_chain: &'a SupplyChain) -> Self {
        DependencyEngine {
            supply_chain: Some(supply_chain),
        }
    }

    /// Aggregate activity coefficients into bank dependency scores.
    ///
    /// Fails with `DimensionMismatch` when the activity sets differ, and with
    /// `InvalidWeight` when a bank's weights do not sum to 1 or a coefficient
    /// is outside [0, 1].
    pub fn assess(
        &self,
        exposure: &ExposureMatrix,
        coefficients: &ServiceCoefficients,
    ) -> RiskResult<DependencyMatrix> {
        exposure.validate()?;
        coefficients.check_unit_interval("service dependency")?;
        ensure_same_set(
            "exposure vs service dependency activities",
            exposure.activities(),
            coefficients.rows(),
        )?;

        let scores = match self.supply_chain {
            Some(chain) => {
                let total = chain.total_coefficients(coefficients)?;
                weighted_unit_scores(exposure, &total)
            }
            None => weighted_unit_scores(exposure, coefficients),
        };

        info!(
            banks = scores.rows().len(),
            services = scores.cols().len(),
            upstream = self.supply_chain.is_some(),
            "Dependency scores computed"
        );

        Ok(scores)
    }
}

impl Default for DependencyEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
