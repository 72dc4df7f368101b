// 📚 Reference Data - shared, read-only coefficient tables
//
// Coefficient tables are owned once, here, and looked up by identifier from
// the per-bank computations. Nothing in the engine copies a table per bank.
//
// Every table is validated when it is built, so aggregation code can assume
// finite values and rectangular shape.

use crate::error::{RiskError, RiskResult};
use crate::supply_chain::SupplyChain;
use crate::types::{ActivityId, HazardId, ServiceId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

// ============================================================================
// MATRIX
// ============================================================================

/// Rectangular numeric table keyed by identifier on both axes.
///
/// Rows and columns are kept sorted, values are dense and row-major. Two
/// matrices built from the same cells in a different order are equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix<R, C> {
    rows: Vec<R>,
    cols: Vec<C>,
    values: Vec<f64>,
}

impl<R, C> Matrix<R, C>
where
    R: Ord + Clone + Display,
    C: Ord + Clone + Display,
{
    /// Build a matrix from `(row, [(col, value)])` groups.
    ///
    /// Fails with `DimensionMismatch` on a repeated row, a repeated cell, or a
    /// row whose column set differs from the others, and with `InvalidWeight`
    /// on NaN or infinite values.
    pub fn from_rows<I, J>(table: &str, rows: I) -> RiskResult<Self>
    where
        I: IntoIterator<Item = (R, J)>,
        J: IntoIterator<Item = (C, f64)>,
    {
        let mut grouped: BTreeMap<R, BTreeMap<C, f64>> = BTreeMap::new();

        for (row, cells) in rows {
            if grouped.contains_key(&row) {
                return Err(RiskError::dimension_mismatch(
                    &format!("{}: duplicate row", table),
                    Vec::<String>::new(),
                    [row],
                ));
            }

            let mut cols = BTreeMap::new();
            for (col, value) in cells {
                if !value.is_finite() {
                    return Err(RiskError::invalid_weight(
                        format!("{} [{}, {}]", table, row, col),
                        "value is not a finite number",
                        value,
                    ));
                }
                if cols.insert(col.clone(), value).is_some() {
                    return Err(RiskError::dimension_mismatch(
                        &format!("{}: duplicate cell in row {}", table, row),
                        Vec::<String>::new(),
                        [col],
                    ));
                }
            }
            grouped.insert(row, cols);
        }

        let header: Vec<C> = grouped
            .values()
            .next()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(grouped.len());
        let mut values = Vec::with_capacity(grouped.len() * header.len());

        for (row, cells) in grouped {
            if !cells.keys().eq(header.iter()) {
                return Err(RiskError::dimension_mismatch(
                    &format!("{}: columns of row {}", table, row),
                    header.iter(),
                    cells.keys(),
                ));
            }
            values.extend(cells.values().copied());
            rows.push(row);
        }

        Ok(Matrix {
            rows,
            cols: header,
            values,
        })
    }

    /// Matrix filled with zeros. Row and column lists are sorted and deduplicated.
    pub fn zeros(rows: impl IntoIterator<Item = R>, cols: impl IntoIterator<Item = C>) -> Self {
        let rows: Vec<R> = rows.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let cols: Vec<C> = cols.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let values = vec![0.0; rows.len() * cols.len()];
        Matrix { rows, cols, values }
    }

    /// Assemble from already sorted, unique axes and row-major values.
    pub(crate) fn from_sorted_parts(rows: Vec<R>, cols: Vec<C>, values: Vec<f64>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(cols.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(values.len(), rows.len() * cols.len());
        Matrix { rows, cols, values }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn cols(&self) -> &[C] {
        &self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.cols.is_empty()
    }

    pub fn row_index(&self, row: &R) -> Option<usize> {
        self.rows.binary_search(row).ok()
    }

    pub fn col_index(&self, col: &C) -> Option<usize> {
        self.cols.binary_search(col).ok()
    }

    pub fn get(&self, row: &R, col: &C) -> Option<f64> {
        let r = self.row_index(row)?;
        let c = self.col_index(col)?;
        Some(self.values[r * self.cols.len() + c])
    }

    /// Row values in column order.
    pub fn row_values(&self, row: &R) -> Option<&[f64]> {
        let r = self.row_index(row)?;
        Some(self.row_at(r))
    }

    pub(crate) fn row_at(&self, r: usize) -> &[f64] {
        let width = self.cols.len();
        &self.values[r * width..(r + 1) * width]
    }

    /// Iterate `(row, col, value)` in row-major identifier order.
    pub fn entries(&self) -> impl Iterator<Item = (&R, &C, f64)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            self.cols
                .iter()
                .enumerate()
                .map(move |(c, col)| (row, col, self.values[r * self.cols.len() + c]))
        })
    }

    pub fn row_sum(&self, row: &R) -> Option<f64> {
        self.row_values(row).map(|v| v.iter().sum())
    }

    /// Every value must lie in [0, 1].
    pub fn check_unit_interval(&self, table: &str) -> RiskResult<()> {
        for (row, col, value) in self.entries() {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiskError::invalid_weight(
                    format!("{} [{}, {}]", table, row, col),
                    "coefficient must lie in [0, 1]",
                    value,
                ));
            }
        }
        Ok(())
    }

    /// Every value must be >= 0.
    pub fn check_non_negative(&self, table: &str) -> RiskResult<()> {
        for (row, col, value) in self.entries() {
            if value < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("{} [{}, {}]", table, row, col),
                    "coefficient must be non-negative",
                    value,
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// INTENSITY TABLE (activity -> scalar)
// ============================================================================

/// Per-activity scalar such as financed emissions or land use per unit lent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityTable {
    values: BTreeMap<ActivityId, f64>,
}

impl IntensityTable {
    /// Values must be finite and non-negative; an activity may appear once.
    pub fn new(table: &str, entries: impl IntoIterator<Item = (ActivityId, f64)>) -> RiskResult<Self> {
        let mut values = BTreeMap::new();
        for (activity, value) in entries {
            if !value.is_finite() || value < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("{} [{}]", table, activity),
                    "intensity must be finite and non-negative",
                    value,
                ));
            }
            if values.insert(activity.clone(), value).is_some() {
                return Err(RiskError::dimension_mismatch(
                    &format!("{}: duplicate activity", table),
                    Vec::<String>::new(),
                    [activity],
                ));
            }
        }
        Ok(IntensityTable { values })
    }

    pub fn get(&self, activity: &ActivityId) -> Option<f64> {
        self.values.get(activity).copied()
    }

    pub fn activities(&self) -> impl Iterator<Item = &ActivityId> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActivityId, f64)> {
        self.values.iter().map(|(a, v)| (a, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// CO-OCCURRENCE TABLE (service x hazard, sparse)
// ============================================================================

/// Sparse (service, hazard) coefficients in [0, 1]. Only listed pairs get an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CooccurrenceTable {
    values: BTreeMap<(ServiceId, HazardId), f64>,
}

impl CooccurrenceTable {
    pub fn new(entries: impl IntoIterator<Item = (ServiceId, HazardId, f64)>) -> RiskResult<Self> {
        let mut values = BTreeMap::new();
        for (service, hazard, value) in entries {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(RiskError::invalid_weight(
                    format!("co-occurrence [{}, {}]", service, hazard),
                    "coefficient must lie in [0, 1]",
                    value,
                ));
            }
            let key = (service, hazard);
            if values.contains_key(&key) {
                return Err(RiskError::dimension_mismatch(
                    "co-occurrence: duplicate pair",
                    Vec::<String>::new(),
                    [format!("{}/{}", key.0, key.1)],
                ));
            }
            values.insert(key, value);
        }
        Ok(CooccurrenceTable { values })
    }

    pub fn get(&self, service: &ServiceId, hazard: &HazardId) -> Option<f64> {
        self.values.get(&(service.clone(), hazard.clone())).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceId, &HazardId, f64)> {
        self.values.iter().map(|((s, h), v)| (s, h, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// REFERENCE DATA ARENA
// ============================================================================

pub type ServiceCoefficients = Matrix<ActivityId, ServiceId>;
pub type HazardSensitivity = Matrix<ActivityId, HazardId>;

/// All reference tables for one run, supplied by the ingestion layer.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    /// Activity x ecosystem service dependency coefficients, in [0, 1].
    pub service_dependency: ServiceCoefficients,
    /// Activity x climate hazard sensitivity, in [0, 1].
    pub hazard_sensitivity: HazardSensitivity,
    pub emissions: IntensityTable,
    pub land_use: IntensityTable,
    pub cooccurrence: Option<CooccurrenceTable>,
    /// Leontief inverse for upstream (indirect) adjustment.
    pub supply_chain: Option<SupplyChain>,
}

/// Fail unless `found` covers exactly the identifiers in `expected`.
pub(crate) fn ensure_same_set<'a, T>(
    context: &str,
    expected: impl IntoIterator<Item = &'a T>,
    found: impl IntoIterator<Item = &'a T>,
) -> RiskResult<()>
where
    T: Ord + Display + 'a,
{
    let expected: BTreeSet<&T> = expected.into_iter().collect();
    let found: BTreeSet<&T> = found.into_iter().collect();
    if expected != found {
        return Err(RiskError::dimension_mismatch(context, expected, found));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
