// 🧩 Community detection - deterministic Louvain
//
// Each level runs local moving until no node changes community, then folds
// every community into a single node (internal weight becomes a self-loop)
// and repeats on the smaller graph. Nodes are visited in index order and
// candidate communities in ascending id order; a move needs a strictly
// positive gain, so the same network always yields the same partition.

use crate::network::{CompoundRiskNetwork, NodeKey};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest modularity gain treated as an improvement.
const MIN_GAIN: f64 = 1e-12;

/// Hard stop on local-moving sweeps per level.
const MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Community {
    pub id: usize,
    pub members: Vec<NodeKey>,
    pub bank_count: usize,
    /// Sum of edge weights with both endpoints inside the community.
    pub internal_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityAssignment {
    /// Community id per network node index.
    #[serde(skip)]
    membership: Vec<usize>,
    pub communities: Vec<Community>,
    pub modularity: f64,
    pub levels: usize,
}

impl CommunityAssignment {
    pub fn community_of(&self, node: usize) -> usize {
        self.membership[node]
    }

    pub fn membership(&self) -> &[usize] {
        &self.membership
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

/// Weighted graph used between Louvain levels.
struct LevelGraph {
    /// Neighbour weights, self excluded.
    links: Vec<BTreeMap<usize, f64>>,
    /// Internal weight folded into each node.
    loops: Vec<f64>,
}

impl LevelGraph {
    fn from_network(network: &CompoundRiskNetwork) -> Self {
        let n = network.node_count();
        let mut links = vec![BTreeMap::new(); n];
        for edge in network.edges() {
            if edge.weight > 0.0 {
                *links[edge.source].entry(edge.target).or_insert(0.0) += edge.weight;
                *links[edge.target].entry(edge.source).or_insert(0.0) += edge.weight;
            }
        }
        LevelGraph {
            links,
            loops: vec![0.0; n],
        }
    }

    fn len(&self) -> usize {
        self.loops.len()
    }

    fn degree(&self, node: usize) -> f64 {
        self.links[node].values().sum::<f64>() + 2.0 * self.loops[node]
    }

    /// Collapse each community into one node.
    fn aggregate(&self, community: &[usize], count: usize) -> Self {
        let mut links = vec![BTreeMap::new(); count];
        let mut loops = vec![0.0; count];
        for i in 0..self.len() {
            let ci = community[i];
            loops[ci] += self.loops[i];
            for (&j, &w) in &self.links[i] {
                let cj = community[j];
                if ci == cj {
                    // Seen from both ends.
                    loops[ci] += w / 2.0;
                } else {
                    *links[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }
        LevelGraph { links, loops }
    }
}

/// One level of local moving. Returns the (renumbered) partition and whether
/// any node moved.
fn local_moving(graph: &LevelGraph, m2: f64) -> (Vec<usize>, bool) {
    let n = graph.len();
    let degree: Vec<f64> = (0..n).map(|i| graph.degree(i)).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut total = degree.clone();
    let mut moved_any = false;

    for _ in 0..MAX_SWEEPS {
        let mut moved = false;
        for i in 0..n {
            let current = community[i];
            let k_i = degree[i];

            let mut w_to: BTreeMap<usize, f64> = BTreeMap::new();
            for (&j, &w) in &graph.links[i] {
                *w_to.entry(community[j]).or_insert(0.0) += w;
            }

            total[current] -= k_i;
            let gain = |c: usize, w: f64| w - total[c] * k_i / m2;

            let mut best = current;
            let mut best_gain = gain(current, w_to.get(&current).copied().unwrap_or(0.0));
            for (&c, &w) in &w_to {
                let g = gain(c, w);
                if g > best_gain + MIN_GAIN {
                    best = c;
                    best_gain = g;
                }
            }

            total[best] += k_i;
            if best != current {
                community[i] = best;
                moved = true;
                moved_any = true;
            }
        }
        if !moved {
            break;
        }
    }

    (renumber(&community), moved_any)
}

/// Relabel communities 0.. by first appearance.
fn renumber(community: &[usize]) -> Vec<usize> {
    let mut ids: BTreeMap<usize, usize> = BTreeMap::new();
    community
        .iter()
        .map(|c| {
            let next = ids.len();
            *ids.entry(*c).or_insert(next)
        })
        .collect()
}

/// Newman modularity of a partition over the positive-weight edges.
pub fn modularity(network: &CompoundRiskNetwork, membership: &[usize]) -> f64 {
    let m: f64 = network.edges().iter().filter(|e| e.weight > 0.0).map(|e| e.weight).sum();
    if m <= 0.0 {
        return 0.0;
    }
    let count = membership.iter().max().map_or(0, |c| c + 1);
    let mut internal = vec![0.0; count];
    let mut total = vec![0.0; count];
    for edge in network.edges().iter().filter(|e| e.weight > 0.0) {
        let (a, b) = (membership[edge.source], membership[edge.target]);
        if a == b {
            internal[a] += edge.weight;
        }
        total[a] += edge.weight;
        total[b] += edge.weight;
    }
    internal
        .iter()
        .zip(&total)
        .map(|(inside, tot)| inside / m - (tot / (2.0 * m)).powi(2))
        .sum()
}

/// Partition the network into communities.
pub fn detect_communities(network: &CompoundRiskNetwork) -> CommunityAssignment {
    let n = network.node_count();
    let mut membership: Vec<usize> = (0..n).collect();
    let mut graph = LevelGraph::from_network(network);
    let m2: f64 = (0..graph.len()).map(|i| graph.degree(i)).sum();
    let mut levels = 0;

    if m2 > 0.0 {
        loop {
            let (community, moved) = local_moving(&graph, m2);
            if !moved {
                break;
            }
            levels += 1;
            for c in membership.iter_mut() {
                *c = community[*c];
            }
            let count = community.iter().max().map_or(0, |c| c + 1);
            graph = graph.aggregate(&community, count);
        }
    }

    let membership = renumber(&membership);
    let count = membership.iter().max().map_or(0, |c| c + 1);

    let mut communities: Vec<Community> = (0..count)
        .map(|id| Community {
            id,
            members: Vec::new(),
            bank_count: 0,
            internal_weight: 0.0,
        })
        .collect();
    for (i, &c) in membership.iter().enumerate() {
        let key = network.key(i);
        if key.is_bank() {
            communities[c].bank_count += 1;
        }
        communities[c].members.push(key.clone());
    }
    for edge in network.edges() {
        if membership[edge.source] == membership[edge.target] {
            communities[membership[edge.source]].internal_weight += edge.weight;
        }
    }

    let modularity = modularity(network, &membership);
    debug!(communities = count, levels, modularity, "Communities detected");

    CommunityAssignment {
        membership,
        communities,
        modularity,
        levels,
    }
}

// ============================================================================
// TESTS
// ============================================================================
