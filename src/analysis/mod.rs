// 📊 Network Analyzer
//
// Everything here reads a built `CompoundRiskNetwork` and produces new
// result values. Nothing is mutated; a fresh run yields a fresh result with
// its own run id.

pub mod cascade;
pub mod centrality;
pub mod community;

pub use cascade::{CascadeConfig, CascadeOutcome, CascadeState, SeverityThreshold};
pub use centrality::BridgingScore;
pub use community::{Community, CommunityAssignment};

use crate::error::RiskResult;
use crate::network::{CompoundRiskNetwork, EdgeKind};
use crate::types::BankId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// PROPAGATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankStress {
    pub bank: BankId,
    /// Weighted degree centrality.
    pub compound_score: f64,
    /// First round in which the bank was stressed; `None` = never.
    pub stress_round: Option<u32>,
}

/// Outcome of one cascade run. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPropagationResult {
    pub run_id: Uuid,
    pub computed_at: DateTime<Utc>,

    /// Resolved θ.
    pub severity_threshold: f64,
    pub contagion_threshold: f64,
    pub max_rounds: u32,

    /// In bank-id order.
    pub banks: Vec<BankStress>,
    /// Banks newly stressed per round; entry 0 is the initial set.
    pub rounds: Vec<Vec<BankId>>,
    pub rounds_executed: u32,
    pub converged: bool,
    /// Set when the round cap stopped a cascade that could still spread.
    pub hit_round_cap: bool,

    pub stressed_count: usize,
    /// Stressed banks over all banks, isolated ones included.
    pub stressed_fraction: f64,
}

impl RiskPropagationResult {
    pub fn stress_round(&self, bank: &BankId) -> Option<u32> {
        self.banks
            .iter()
            .find(|b| &b.bank == bank)
            .and_then(|b| b.stress_round)
    }

    /// Cumulative stressed banks after round `k`, in id order.
    pub fn stressed_after(&self, k: u32) -> Vec<BankId> {
        self.banks
            .iter()
            .filter(|b| b.stress_round.is_some_and(|r| r <= k))
            .map(|b| b.bank.clone())
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Cascade: {}/{} banks stressed ({:.1}%), θ={:.4}, φ={:.4}, {} round(s), {}",
            self.stressed_count,
            self.banks.len(),
            self.stressed_fraction * 100.0,
            self.severity_threshold,
            self.contagion_threshold,
            self.rounds_executed,
            if self.hit_round_cap {
                "capped before convergence"
            } else {
                "converged"
            }
        )
    }
}

// ============================================================================
// RANKINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundExposure {
    /// 1-based.
    pub rank: usize,
    pub bank: BankId,
    pub weighted_degree: f64,
    /// Sum of Bank - Service edge weights.
    pub dependency_total: f64,
    /// Sum of Bank - Hazard edge weights.
    pub hazard_total: f64,
    pub footprint: Option<f64>,
    pub community: usize,
    pub stress_round: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Weighted degree per bank.
    pub centrality: BTreeMap<BankId, f64>,
    pub bridging: Vec<BridgingScore>,
    pub communities: CommunityAssignment,
    pub propagation: RiskPropagationResult,
    /// Highest weighted degree first.
    pub rankings: Vec<CompoundExposure>,
}

impl AnalysisReport {
    pub fn summary(&self) -> String {
        let top = self
            .rankings
            .first()
            .map(|r| format!("{} ({:.4})", r.bank, r.weighted_degree))
            .unwrap_or_else(|| "-".to_string());
        let bridge = self
            .bridging
            .first()
            .map(|b| format!("{} ({:.4})", b.node, b.betweenness))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "Analysis: {} communities (Q={:.4}), top exposure {}, top bridge {}\n{}",
            self.communities.len(),
            self.communities.modularity,
            top,
            bridge,
            self.propagation.summary()
        )
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct NetworkAnalyzer {
    config: CascadeConfig,
}

impl NetworkAnalyzer {
    pub fn new(config: CascadeConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(NetworkAnalyzer { config })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Full analysis: centrality, bridging, communities, cascade, rankings.
    pub fn analyze(&self, network: &CompoundRiskNetwork) -> AnalysisReport {
        let degrees = centrality::weighted_degrees(network);
        let bridging = centrality::bridging_scores(network);
        let communities = community::detect_communities(network);
        let propagation = self.propagate_with(network, &degrees);
        let rankings = rank_banks(network, &degrees, &communities, &propagation);

        let centrality = network
            .bank_indices()
            .into_iter()
            .filter_map(|i| network.key(i).as_bank().map(|b| (b.clone(), degrees[i])))
            .collect();

        info!(
            banks = network.bank_count(),
            communities = communities.len(),
            modularity = communities.modularity,
            "Network analysis complete"
        );

        AnalysisReport {
            centrality,
            bridging,
            communities,
            propagation,
            rankings,
        }
    }

    /// Cascade only.
    pub fn propagate(&self, network: &CompoundRiskNetwork) -> RiskPropagationResult {
        let degrees = centrality::weighted_degrees(network);
        self.propagate_with(network, &degrees)
    }

    fn propagate_with(&self, network: &CompoundRiskNetwork, degrees: &[f64]) -> RiskPropagationResult {
        let outcome = cascade::simulate(network, degrees, &self.config);
        let bank_key = |i: usize| network.key(i).as_bank().cloned();

        let banks: Vec<BankStress> = network
            .bank_indices()
            .into_iter()
            .filter_map(|i| {
                bank_key(i).map(|bank| BankStress {
                    bank,
                    compound_score: degrees[i],
                    stress_round: outcome.final_state.stressed_round(i),
                })
            })
            .collect();
        let rounds: Vec<Vec<BankId>> = outcome
            .rounds
            .iter()
            .map(|round| round.iter().filter_map(|i| bank_key(*i)).collect())
            .collect();

        let stressed_count = outcome.final_state.stressed_count();
        let stressed_fraction = if banks.is_empty() {
            0.0
        } else {
            stressed_count as f64 / banks.len() as f64
        };

        if outcome.hit_round_cap {
            warn!(
                max_rounds = self.config.max_rounds,
                stressed = stressed_count,
                "Cascade stopped at round cap before reaching a fixed point"
            );
        }
        info!(
            theta = outcome.severity_threshold,
            phi = self.config.contagion_threshold,
            rounds = outcome.rounds_executed(),
            stressed = stressed_count,
            "Cascade simulated"
        );

        RiskPropagationResult {
            run_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            severity_threshold: outcome.severity_threshold,
            contagion_threshold: self.config.contagion_threshold,
            max_rounds: self.config.max_rounds,
            rounds_executed: outcome.rounds_executed(),
            converged: outcome.converged,
            hit_round_cap: outcome.hit_round_cap,
            banks,
            rounds,
            stressed_count,
            stressed_fraction,
        }
    }
}

fn rank_banks(
    network: &CompoundRiskNetwork,
    degrees: &[f64],
    communities: &CommunityAssignment,
    propagation: &RiskPropagationResult,
) -> Vec<CompoundExposure> {
    let mut rows: Vec<CompoundExposure> = network
        .bank_indices()
        .into_iter()
        .filter_map(|i| {
            let bank = network.key(i).as_bank()?.clone();
            let (mut dependency_total, mut hazard_total) = (0.0, 0.0);
            for edge in network.edges().iter().filter(|e| e.source == i || e.target == i) {
                match edge.kind {
                    EdgeKind::Dependency => dependency_total += edge.weight,
                    EdgeKind::HazardExposure => hazard_total += edge.weight,
                    EdgeKind::Cooccurrence => {}
                }
            }
            Some(CompoundExposure {
                rank: 0,
                stress_round: propagation.stress_round(&bank),
                footprint: network.nodes()[i].footprint.as_ref().map(|f| f.total),
                community: communities.community_of(i),
                weighted_degree: degrees[i],
                dependency_total,
                hazard_total,
                bank,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.weighted_degree
            .total_cmp(&a.weighted_degree)
            .then_with(|| a.bank.cmp(&b.bank))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::network::{Edge, Node, NodeKey};

    fn node(key: NodeKey) -> Node {
        Node { key, footprint: None }
    }

    /// BankA 0.66 / BankB 0.26 on pollination, plus isolated BankC.
    fn network() -> CompoundRiskNetwork {
        CompoundRiskNetwork::from_parts(
            vec![
                node(NodeKey::Bank("BankA".into())),
                node(NodeKey::Bank("BankB".into())),
                node(NodeKey::Bank("BankC".into())),
                node(NodeKey::Service("pollination".into())),
            ],
            vec![
                Edge { source: 0, target: 3, kind: EdgeKind::Dependency, weight: 0.66 },
                Edge { source: 1, target: 3, kind: EdgeKind::Dependency, weight: 0.26 },
            ],
        )
        .unwrap()
    }

    fn analyzer(phi: f64, theta: f64) -> NetworkAnalyzer {
        NetworkAnalyzer::new(CascadeConfig::new(phi).with_severity(SeverityThreshold::Absolute(theta))).unwrap()
    }

    #[test]
    fn test_bank_b_stressed_when_pressure_exceeds_phi() {
        // Pressure on BankB = 0.26 × 0.66 = 0.1716
        let result = analyzer(0.1, 0.5).propagate(&network());
        assert_eq!(result.stress_round(&"BankA".into()), Some(0));
        assert_eq!(result.stress_round(&"BankB".into()), Some(1));
        assert_eq!(result.stress_round(&"BankC".into()), None);
        assert!(result.converged);
        assert!((result.stressed_fraction - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bank_b_never_stressed_when_phi_high() {
        let result = analyzer(0.2, 0.5).propagate(&network());
        assert_eq!(result.stress_round(&"BankB".into()), None);
        assert_eq!(result.rounds_executed, 0);
        assert!(result.converged);
        assert_eq!(result.rounds, vec![vec![BankId::from("BankA")]]);
    }

    #[test]
    fn test_default_percentile_threshold() {
        let analyzer = NetworkAnalyzer::new(CascadeConfig::new(0.5)).unwrap();
        let result = analyzer.propagate(&network());
        // Bank degrees [0.66, 0.26, 0.0] -> 75th percentile 0.46
        assert!((result.severity_threshold - 0.46).abs() < 1e-12);
        assert_eq!(result.stressed_after(0), vec![BankId::from("BankA")]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = NetworkAnalyzer::new(CascadeConfig::new(f64::INFINITY)).err();
        assert!(matches!(err, Some(RiskError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rankings_and_report() {
        let report = analyzer(0.1, 0.5).analyze(&network());
        let order: Vec<&str> = report.rankings.iter().map(|r| r.bank.as_str()).collect();
        assert_eq!(order, vec!["BankA", "BankB", "BankC"]);
        assert_eq!(report.rankings[0].rank, 1);
        assert!((report.rankings[0].dependency_total - 0.66).abs() < 1e-12);
        assert_eq!(report.rankings[2].stress_round, None);
        assert_eq!(report.centrality.len(), 3);
        assert_eq!(report.bridging.len(), 1);
        assert!(report.summary().contains("communities"));
    }

    #[test]
    fn test_each_run_gets_new_id() {
        let analyzer = analyzer(0.1, 0.5);
        let a = analyzer.propagate(&network());
        let b = analyzer.propagate(&network());
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.banks, b.banks);
    }
}
