// 📍 Centrality and bridging scores

use crate::network::{CompoundRiskNetwork, NodeKey};
use serde::Serialize;
use std::collections::VecDeque;

/// Weighted degree (sum of incident edge weights) for every node.
pub fn weighted_degrees(network: &CompoundRiskNetwork) -> Vec<f64> {
    (0..network.node_count()).map(|i| network.weighted_degree(i)).collect()
}

/// How strongly a service or hazard node ties distinct banks together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgingScore {
    pub node: NodeKey,
    /// Share of bank-to-bank shortest paths running through this node, in [0, 1].
    pub betweenness: f64,
    /// Banks directly attached with positive weight.
    pub banks_connected: usize,
    /// Σ over attached bank pairs of w(b1, node) × w(b2, node).
    pub shared_exposure: f64,
}

/// Bridging scores for every Service and Hazard node, strongest first.
///
/// Betweenness is Brandes' algorithm over positive-weight edges with hop
/// distance, where only bank nodes count as path endpoints.
pub fn bridging_scores(network: &CompoundRiskNetwork) -> Vec<BridgingScore> {
    let n = network.node_count();
    let banks = network.bank_indices();
    let mut betweenness = vec![0.0; n];

    for &source in &banks {
        if network.is_isolated(source) {
            continue;
        }
        accumulate_from(network, source, &mut betweenness);
    }

    // Each unordered pair was counted from both ends.
    let pairs = banks.len() * banks.len().saturating_sub(1) / 2;
    let norm = if pairs > 0 { 2.0 * pairs as f64 } else { 1.0 };

    let mut scores: Vec<BridgingScore> = (0..n)
        .filter(|i| !network.key(*i).is_bank())
        .map(|i| {
            let weights: Vec<f64> = network
                .neighbors(i)
                .iter()
                .filter(|(j, w)| *w > 0.0 && network.key(*j).is_bank())
                .map(|(_, w)| *w)
                .collect();
            let sum: f64 = weights.iter().sum();
            let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
            BridgingScore {
                node: network.key(i).clone(),
                betweenness: betweenness[i] / norm,
                banks_connected: weights.len(),
                shared_exposure: (sum * sum - sum_sq) / 2.0,
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.betweenness
            .total_cmp(&a.betweenness)
            .then_with(|| b.shared_exposure.total_cmp(&a.shared_exposure))
            .then_with(|| a.node.cmp(&b.node))
    });
    scores
}

/// Single-source Brandes pass counting dependencies on bank targets only.
fn accumulate_from(network: &CompoundRiskNetwork, source: usize, betweenness: &mut [f64]) {
    let n = network.node_count();
    let mut sigma = vec![0.0_f64; n];
    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    sigma[source] = 1.0;
    dist[source] = Some(0);
    queue.push_back(source);

    while let Some(v) = queue.pop_front() {
        order.push(v);
        let dv = dist[v].unwrap_or(0);
        for &(w, weight) in network.neighbors(v) {
            if weight <= 0.0 {
                continue;
            }
            if dist[w].is_none() {
                dist[w] = Some(dv + 1);
                queue.push_back(w);
            }
            if dist[w] == Some(dv + 1) {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0_f64; n];
    while let Some(w) = order.pop() {
        let target = if w != source && network.key(w).is_bank() { 1.0 } else { 0.0 };
        let coeff = (target + delta[w]) / sigma[w];
        for &v in &preds[w] {
            delta[v] += sigma[v] * coeff;
        }
        if w != source {
            betweenness[w] += delta[w];
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Edge, EdgeKind, Node};

    fn node(key: NodeKey) -> Node {
        Node { key, footprint: None }
    }

    /// A, B share `water`; B, C share `floods`; `soil` touches only C.
    fn network() -> CompoundRiskNetwork {
        CompoundRiskNetwork::from_parts(
            vec![
                node(NodeKey::Bank("A".into())),
                node(NodeKey::Bank("B".into())),
                node(NodeKey::Bank("C".into())),
                node(NodeKey::Service("soil".into())),
                node(NodeKey::Service("water".into())),
                node(NodeKey::Hazard("floods".into())),
            ],
            vec![
                Edge { source: 0, target: 4, kind: EdgeKind::Dependency, weight: 0.5 },
                Edge { source: 1, target: 4, kind: EdgeKind::Dependency, weight: 0.4 },
                Edge { source: 1, target: 5, kind: EdgeKind::HazardExposure, weight: 0.2 },
                Edge { source: 2, target: 5, kind: EdgeKind::HazardExposure, weight: 0.3 },
                Edge { source: 2, target: 3, kind: EdgeKind::Dependency, weight: 0.9 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_weighted_degrees() {
        let d = weighted_degrees(&network());
        assert!((d[1] - 0.6).abs() < 1e-12);
        assert!((d[2] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_bridging_betweenness() {
        let scores = bridging_scores(&network());
        let get = |key: NodeKey| scores.iter().find(|s| s.node == key).unwrap().clone();

        // Pairs: A-B via water, B-C via floods, A-C via water + B + floods.
        let water = get(NodeKey::Service("water".into()));
        let floods = get(NodeKey::Hazard("floods".into()));
        let soil = get(NodeKey::Service("soil".into()));
        assert!((water.betweenness - 2.0 / 3.0).abs() < 1e-12);
        assert!((floods.betweenness - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(soil.betweenness, 0.0);
        assert_eq!(soil.banks_connected, 1);
        assert_eq!(soil.shared_exposure, 0.0);
        assert!((water.shared_exposure - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_bridging_order_is_deterministic() {
        let scores = bridging_scores(&network());
        // water and floods tie on betweenness; water has the larger shared exposure.
        assert_eq!(scores[0].node, NodeKey::Service("water".into()));
        assert_eq!(scores[1].node, NodeKey::Hazard("floods".into()));
        assert_eq!(scores[2].node, NodeKey::Service("soil".into()));
    }
}
