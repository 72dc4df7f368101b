// Per-bank weighted-sum aggregation shared by the dependency and hazard stages.
//
// Each bank row is independent, so with the `parallel` feature rows are
// computed on the rayon pool. Rows come back in bank-id order either way.

use crate::exposure::{Bank, ExposureMatrix};
use crate::reference::Matrix;
use crate::types::{ActivityId, BankId};
use std::fmt::Display;

/// Run `f` once per bank, keeping bank-id order.
#[cfg(feature = "parallel")]
pub(crate) fn map_banks<T, F>(exposure: &ExposureMatrix, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Bank) -> T + Sync + Send,
{
    use rayon::prelude::*;
    let banks: Vec<&Bank> = exposure.banks().collect();
    banks.par_iter().map(|bank| f(*bank)).collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_banks<T, F>(exposure: &ExposureMatrix, f: F) -> Vec<T>
where
    F: Fn(&Bank) -> T,
{
    exposure.banks().map(f).collect()
}

/// `out[bank, c] = Σ_a exposure[bank, a] × coefficients[a, c]`, clamped to [0, 1].
///
/// Callers must have checked that `coefficients.rows()` equals
/// `exposure.activities()`; both are sorted so indices line up.
pub(crate) fn weighted_unit_scores<C>(
    exposure: &ExposureMatrix,
    coefficients: &Matrix<ActivityId, C>,
) -> Matrix<BankId, C>
where
    C: Ord + Clone + Display + Sync,
{
    let width = coefficients.cols().len();

    let rows = map_banks(exposure, |bank| {
        let weights = exposure.dense_row(bank);
        let mut out = vec![0.0; width];
        for (a, weight) in weights.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            for (c, coefficient) in coefficients.row_at(a).iter().enumerate() {
                out[c] += weight * coefficient;
            }
        }
        for value in out.iter_mut() {
            *value = value.clamp(0.0, 1.0);
        }
        out
    });

    Matrix::from_sorted_parts(
        exposure.bank_ids().cloned().collect(),
        coefficients.cols().to_vec(),
        rows.into_iter().flatten().collect(),
    )
}
