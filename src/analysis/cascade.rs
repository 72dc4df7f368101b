// 🌊 Cascade Simulation - discrete-round threshold propagation
//
// State machine:
//   round 0   : bank stressed  <=>  weighted degree > θ  and not isolated
//   round k+1 : bank stressed  <=>  already stressed, or
//               contagion pressure against the round-k set > φ (and not isolated)
//
// pressure(b) = Σ_{m shared node} Σ_{s stressed bank on m} w(b, m) × w(m, s)
//
// Updates are synchronous: every candidate in a round is measured against
// the previous round's stressed set, so visiting order cannot change the
// result. The loop stops at a fixed point or after `max_rounds` rounds.

use crate::error::{RiskError, RiskResult};
use crate::network::CompoundRiskNetwork;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ROUNDS: u32 = 20;
pub const DEFAULT_SEVERITY_PERCENTILE: f64 = 75.0;

// ============================================================================
// CONFIG
// ============================================================================

/// How θ is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityThreshold {
    /// Percentile (0-100) of bank weighted degrees, linear interpolation.
    Percentile(f64),
    /// Fixed centrality cutoff.
    Absolute(f64),
}

impl Default for SeverityThreshold {
    fn default() -> Self {
        SeverityThreshold::Percentile(DEFAULT_SEVERITY_PERCENTILE)
    }
}

impl SeverityThreshold {
    pub fn resolve(&self, bank_centralities: &[f64]) -> f64 {
        match *self {
            SeverityThreshold::Percentile(p) => percentile(bank_centralities, p),
            SeverityThreshold::Absolute(theta) => theta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub severity_threshold: SeverityThreshold,
    /// φ. No default: an analyst has to choose it.
    pub contagion_threshold: f64,
    pub max_rounds: u32,
}

impl CascadeConfig {
    pub fn new(contagion_threshold: f64) -> Self {
        CascadeConfig {
            severity_threshold: SeverityThreshold::default(),
            contagion_threshold,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_severity(mut self, severity: SeverityThreshold) -> Self {
        self.severity_threshold = severity;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn validate(&self) -> RiskResult<()> {
        if !self.contagion_threshold.is_finite() || self.contagion_threshold < 0.0 {
            return Err(RiskError::invalid_config(
                "contagion_threshold",
                format!("must be finite and non-negative, got {}", self.contagion_threshold),
            ));
        }
        match self.severity_threshold {
            SeverityThreshold::Percentile(p) if !(0.0..=100.0).contains(&p) => Err(RiskError::invalid_config(
                "severity_threshold",
                format!("percentile must lie in [0, 100], got {}", p),
            )),
            SeverityThreshold::Absolute(theta) if !theta.is_finite() => Err(RiskError::invalid_config(
                "severity_threshold",
                "absolute threshold must be finite",
            )),
            _ => Ok(()),
        }
    }
}

/// Linear-interpolation percentile (the usual "linear" definition).
/// An empty slice gives 0.0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

// ============================================================================
// STATE
// ============================================================================

/// Per-node stress rounds plus the global round counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeState {
    /// Indexed by network node; `Some(k)` = first stressed in round k.
    stressed_round: Vec<Option<u32>>,
    round: u32,
}

impl CascadeState {
    /// Round-0 state: banks whose centrality exceeds θ.
    pub fn initial(network: &CompoundRiskNetwork, centrality: &[f64], theta: f64) -> Self {
        let mut stressed_round = vec![None; network.node_count()];
        for i in network.bank_indices() {
            if !network.is_isolated(i) && centrality[i] > theta {
                stressed_round[i] = Some(0);
            }
        }
        CascadeState {
            stressed_round,
            round: 0,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_stressed(&self, node: usize) -> bool {
        self.stressed_round[node].is_some()
    }

    pub fn stressed_round(&self, node: usize) -> Option<u32> {
        self.stressed_round[node]
    }

    /// Stressed node indices, ascending (= bank-id order).
    pub fn stressed(&self) -> Vec<usize> {
        (0..self.stressed_round.len()).filter(|i| self.is_stressed(*i)).collect()
    }

    pub fn stressed_count(&self) -> usize {
        self.stressed_round.iter().filter(|r| r.is_some()).count()
    }
}

/// Result of advancing one round.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeStep {
    pub state: CascadeState,
    /// Banks stressed in this round, ascending.
    pub newly_stressed: Vec<usize>,
}

/// Shared-channel pressure on `bank` from the currently stressed banks.
pub fn contagion_pressure(network: &CompoundRiskNetwork, state: &CascadeState, bank: usize) -> f64 {
    let mut pressure = 0.0;
    for &(shared, w_bank) in network.neighbors(bank) {
        if network.key(shared).is_bank() {
            continue;
        }
        for &(other, w_other) in network.neighbors(shared) {
            if other != bank && network.key(other).is_bank() && state.is_stressed(other) {
                pressure += w_bank * w_other;
            }
        }
    }
    pressure
}

fn qualifies(network: &CompoundRiskNetwork, state: &CascadeState, bank: usize, phi: f64) -> bool {
    !state.is_stressed(bank) && !network.is_isolated(bank) && contagion_pressure(network, state, bank) > phi
}

#[cfg(feature = "parallel")]
fn scan_candidates(network: &CompoundRiskNetwork, state: &CascadeState, phi: f64) -> Vec<usize> {
    use rayon::prelude::*;
    network
        .bank_indices()
        .into_par_iter()
        .filter(|b| qualifies(network, state, *b, phi))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn scan_candidates(network: &CompoundRiskNetwork, state: &CascadeState, phi: f64) -> Vec<usize> {
    network
        .bank_indices()
        .into_iter()
        .filter(|b| qualifies(network, state, *b, phi))
        .collect()
}

/// Pure transition `(state, network) -> state'`.
pub fn step(state: &CascadeState, network: &CompoundRiskNetwork, phi: f64) -> CascadeStep {
    let mut newly_stressed = scan_candidates(network, state, phi);
    newly_stressed.sort_unstable();

    let mut next = state.clone();
    next.round += 1;
    for &bank in &newly_stressed {
        next.stressed_round[bank] = Some(next.round);
    }

    CascadeStep {
        state: next,
        newly_stressed,
    }
}

// ============================================================================
// SIMULATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub final_state: CascadeState,
    /// Banks stressed in each round; entry 0 is the initial set.
    pub rounds: Vec<Vec<usize>>,
    pub severity_threshold: f64,
    pub converged: bool,
    pub hit_round_cap: bool,
}

impl CascadeOutcome {
    pub fn rounds_executed(&self) -> u32 {
        self.final_state.round()
    }

    /// Cumulative stressed set after round `k` (clamped to the last round).
    pub fn stressed_after(&self, k: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.rounds.iter().take(k + 1).flatten().copied().collect();
        out.sort_unstable();
        out
    }
}

pub fn simulate(network: &CompoundRiskNetwork, centrality: &[f64], config: &CascadeConfig) -> CascadeOutcome {
    let bank_centralities: Vec<f64> = network.bank_indices().iter().map(|i| centrality[*i]).collect();
    let theta = config.severity_threshold.resolve(&bank_centralities);

    let mut state = CascadeState::initial(network, centrality, theta);
    let mut rounds = vec![state.stressed()];

    let (converged, hit_round_cap) = loop {
        let next = step(&state, network, config.contagion_threshold);
        if next.newly_stressed.is_empty() {
            break (true, false);
        }
        if state.round() >= config.max_rounds {
            break (false, true);
        }
        rounds.push(next.newly_stressed);
        state = next.state;
    };

    CascadeOutcome {
        final_state: state,
        rounds,
        severity_threshold: theta,
        converged,
        hit_round_cap,
    }
}

// ============================================================================
// TESTS
// ============================================================================
