// 🏦 Exposure Matrix - bank x economic activity portfolio weights
//
// A Bank can only be constructed with weights that are finite, non-negative,
// unique per activity and sum to 1.0 (± WEIGHT_TOLERANCE). Everything
// downstream relies on that invariant.

use crate::error::{RiskError, RiskResult};
use crate::types::{ActivityId, BankId, WEIGHT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ============================================================================
// BANK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bank {
    pub id: BankId,

    /// Total portfolio value (currency units), used for financed footprints.
    pub portfolio_value: f64,

    /// Portfolio weights in the order they were supplied.
    exposures: Vec<(ActivityId, f64)>,
}

impl Bank {
    pub fn new(
        id: impl Into<BankId>,
        portfolio_value: f64,
        exposures: Vec<(ActivityId, f64)>,
    ) -> RiskResult<Self> {
        let id = id.into();

        if !portfolio_value.is_finite() || portfolio_value < 0.0 {
            return Err(RiskError::invalid_weight(
                format!("bank {}", id),
                "portfolio value must be finite and non-negative",
                portfolio_value,
            ));
        }

        let mut seen = BTreeSet::new();
        for (activity, weight) in &exposures {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("bank {} / activity {}", id, activity),
                    "exposure weight must be finite and non-negative",
                    *weight,
                ));
            }
            if !seen.insert(activity) {
                return Err(RiskError::invalid_weight(
                    format!("bank {} / activity {}", id, activity),
                    "activity listed more than once",
                    *weight,
                ));
            }
        }

        let total: f64 = exposures.iter().map(|(_, w)| w).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RiskError::invalid_weight(
                format!("bank {}", id),
                "exposure weights must sum to 1.0",
                total,
            ));
        }

        Ok(Bank {
            id,
            portfolio_value,
            exposures,
        })
    }

    /// Build a bank from raw loan amounts per activity.
    ///
    /// Weights are amounts over the total, and the total becomes the
    /// portfolio value. Amounts for a repeated activity are added together.
    pub fn from_amounts(id: impl Into<BankId>, amounts: Vec<(ActivityId, f64)>) -> RiskResult<Self> {
        let id = id.into();
        let mut merged: Vec<(ActivityId, f64)> = Vec::with_capacity(amounts.len());

        for (activity, amount) in amounts {
            if !amount.is_finite() || amount < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("bank {} / activity {}", id, activity),
                    "loan amount must be finite and non-negative",
                    amount,
                ));
            }
            match merged.iter_mut().find(|(a, _)| *a == activity) {
                Some((_, existing)) => *existing += amount,
                None => merged.push((activity, amount)),
            }
        }

        let total: f64 = merged.iter().map(|(_, a)| a).sum();
        if total <= 0.0 {
            return Err(RiskError::invalid_weight(
                format!("bank {}", id),
                "total loan amount must be positive",
                total,
            ));
        }

        let weights = merged.into_iter().map(|(a, amount)| (a, amount / total)).collect();
        Bank::new(id, total, weights)
    }

    pub fn exposures(&self) -> &[(ActivityId, f64)] {
        &self.exposures
    }

    /// Weight on one activity (0.0 when the bank does not finance it).
    pub fn weight(&self, activity: &ActivityId) -> f64 {
        self.exposures
            .iter()
            .find(|(a, _)| a == activity)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn weight_sum(&self) -> f64 {
        self.exposures.iter().map(|(_, w)| w).sum()
    }
}

// ============================================================================
// LOAN RECORD
// ============================================================================

/// One loan line, as in a bank's credit register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub bank_id: BankId,
    pub activity: ActivityId,
    pub loan_amount: f64,
}

// ============================================================================
// EXPOSURE MATRIX
// ============================================================================

/// Banks keyed by identifier plus the declared activity universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureMatrix {
    banks: BTreeMap<BankId, Bank>,
    activities: Vec<ActivityId>,
}

impl ExposureMatrix {
    /// Activity universe = union of the activities the banks finance.
    pub fn new(banks: Vec<Bank>) -> RiskResult<Self> {
        let activities: BTreeSet<ActivityId> = banks
            .iter()
            .flat_map(|b| b.exposures.iter().map(|(a, _)| a.clone()))
            .collect();
        Self::with_activities(activities, banks)
    }

    /// Declare the activity universe explicitly (it may contain activities
    /// no bank finances). Every bank activity must belong to it.
    pub fn with_activities(
        activities: impl IntoIterator<Item = ActivityId>,
        banks: Vec<Bank>,
    ) -> RiskResult<Self> {
        let universe: BTreeSet<ActivityId> = activities.into_iter().collect();
        let mut by_id = BTreeMap::new();

        for bank in banks {
            let unknown: Vec<&ActivityId> = bank
                .exposures
                .iter()
                .map(|(a, _)| a)
                .filter(|a| !universe.contains(*a))
                .collect();
            if !unknown.is_empty() {
                return Err(RiskError::dimension_mismatch(
                    &format!("exposure activities of bank {}", bank.id),
                    universe.iter(),
                    unknown,
                ));
            }
            if by_id.contains_key(&bank.id) {
                return Err(RiskError::dimension_mismatch(
                    "exposure matrix: duplicate bank",
                    Vec::<String>::new(),
                    [bank.id],
                ));
            }
            by_id.insert(bank.id.clone(), bank);
        }

        debug!(banks = by_id.len(), activities = universe.len(), "Exposure matrix built");

        Ok(ExposureMatrix {
            banks: by_id,
            activities: universe.into_iter().collect(),
        })
    }

    /// Group loan lines per bank and normalize them into weights.
    pub fn from_loans(loans: &[LoanRecord]) -> RiskResult<Self> {
        let mut grouped: BTreeMap<&BankId, Vec<(ActivityId, f64)>> = BTreeMap::new();
        for loan in loans {
            grouped
                .entry(&loan.bank_id)
                .or_default()
                .push((loan.activity.clone(), loan.loan_amount));
        }

        let banks = grouped
            .into_iter()
            .map(|(id, amounts)| Bank::from_amounts(id.clone(), amounts))
            .collect::<RiskResult<Vec<_>>>()?;

        Self::new(banks)
    }

    pub fn activities(&self) -> &[ActivityId] {
        &self.activities
    }

    pub fn bank_ids(&self) -> impl Iterator<Item = &BankId> {
        self.banks.keys()
    }

    /// Banks in identifier order.
    pub fn banks(&self) -> impl Iterator<Item = &Bank> {
        self.banks.values()
    }

    pub fn bank(&self, id: &BankId) -> Option<&Bank> {
        self.banks.get(id)
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Re-check the weight-sum invariant for every bank.
    pub fn validate(&self) -> RiskResult<()> {
        for bank in self.banks.values() {
            let total = bank.weight_sum();
            if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(RiskError::invalid_weight(
                    format!("bank {}", bank.id),
                    "exposure weights must sum to 1.0",
                    total,
                ));
            }
        }
        Ok(())
    }

    /// Dense weight row for one bank, aligned with `activities()`.
    pub(crate) fn dense_row(&self, bank: &Bank) -> Vec<f64> {
        self.activities.iter().map(|a| bank.weight(a)).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
