// 🔗 Supply-chain adjustment (Leontief inverse)
//
// An activity depends on nature directly and through the activities it buys
// from. With a Leontief inverse L (activity x activity):
//
//   indirect[a, s] = Σ_b  L[a, b] / Σ_b' L[a, b']  ×  direct[b, s]
//   total[a, s]    = direct[a, s] + (1 - direct[a, s]) × indirect[a, s]
//
// and for per-unit pressures (emissions, land use) the upstream-inclusive
// intensity is the column-weighted sum  total[a] = Σ_b L[b, a] × direct[b].

use crate::error::RiskResult;
use crate::reference::{ensure_same_set, IntensityTable, Matrix};
use crate::types::ActivityId;
use std::fmt::Display;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SupplyChain {
    leontief: Matrix<ActivityId, ActivityId>,
}

impl SupplyChain {
    /// The inverse must be square over one activity set and non-negative.
    pub fn new(leontief: Matrix<ActivityId, ActivityId>) -> RiskResult<Self> {
        ensure_same_set("leontief inverse rows vs columns", leontief.rows(), leontief.cols())?;
        leontief.check_non_negative("leontief inverse")?;
        Ok(SupplyChain { leontief })
    }

    pub fn activities(&self) -> &[ActivityId] {
        self.leontief.rows()
    }

    /// Total (direct + upstream) coefficients for a [0, 1] coefficient table.
    pub fn total_coefficients<C>(&self, direct: &Matrix<ActivityId, C>) -> RiskResult<Matrix<ActivityId, C>>
    where
        C: Ord + Clone + Display,
    {
        ensure_same_set("supply chain vs coefficient activities", self.activities(), direct.rows())?;

        let n = self.activities().len();
        let width = direct.cols().len();
        let mut values = Vec::with_capacity(n * width);

        for a in 0..n {
            let l_row = self.leontief.row_at(a);
            let row_sum: f64 = l_row.iter().sum();
            let direct_row = direct.row_at(a);

            for s in 0..width {
                let indirect = if row_sum > 0.0 {
                    (0..n)
                        .map(|b| l_row[b] / row_sum * direct.row_at(b)[s])
                        .sum::<f64>()
                } else {
                    0.0
                };
                let d = direct_row[s];
                values.push((d + (1.0 - d) * indirect).clamp(0.0, 1.0));
            }
        }

        debug!(activities = n, columns = width, "Applied supply-chain adjustment");

        Ok(Matrix::from_sorted_parts(
            direct.rows().to_vec(),
            direct.cols().to_vec(),
            values,
        ))
    }

    /// Upstream-inclusive per-unit intensity.
    pub fn upstream_intensity(&self, table: &str, direct: &IntensityTable) -> RiskResult<IntensityTable> {
        ensure_same_set(
            &format!("supply chain vs {} activities", table),
            self.activities(),
            direct.activities(),
        )?;

        let activities = self.activities();
        let totals = activities.iter().enumerate().map(|(a, activity)| {
            let total: f64 = activities
                .iter()
                .enumerate()
                .map(|(b, supplier)| self.leontief.row_at(b)[a] * direct.get(supplier).unwrap_or(0.0))
                .sum();
            (activity.clone(), total)
        });

        IntensityTable::new(table, totals.collect::<Vec<_>>())
    }
}

// ============================================================================
// TESTS
// ============================================================================
