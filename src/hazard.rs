// 🌪️ Hazard Exposure - bank x climate hazard factor
// Same weighted-sum aggregation as the dependency stage, over the
// activity x hazard sensitivity table.

use crate::aggregation::weighted_unit_scores;
use crate::error::RiskResult;
use crate::exposure::ExposureMatrix;
use crate::reference::{ensure_same_set, HazardSensitivity, Matrix};
use crate::types::{BankId, HazardId};
use tracing::info;

/// Bank x hazard exposure scores in [0, 1].
pub type HazardExposureMatrix = Matrix<BankId, HazardId>;

pub fn assess_hazard_exposure(
    exposure: &ExposureMatrix,
    sensitivity: &HazardSensitivity,
) -> RiskResult<HazardExposureMatrix> {
    exposure.validate()?;
    sensitivity.check_unit_interval("hazard sensitivity")?;
    ensure_same_set(
        "exposure vs hazard sensitivity activities",
        exposure.activities(),
        sensitivity.rows(),
    )?;

    let scores = weighted_unit_scores(exposure, sensitivity);
    info!(
        banks = scores.rows().len(),
        hazards = scores.cols().len(),
        "Hazard exposure computed"
    );
    Ok(scores)
}
