// 🕸️ Compound Risk Network
//
// One homogeneous graph over three node kinds. Banks, services and hazards
// share a single key space (`NodeKey`), so centrality and cascade code walk
// one edge list instead of three graph classes.
//
// The network is rebuilt from the score tables on every run and never
// patched in place.

pub mod builder;

pub use builder::NetworkBuilder;

use crate::error::{RiskError, RiskResult};
use crate::footprint::FootprintScore;
use crate::types::{BankId, HazardId, ServiceId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// NODES
// ============================================================================

/// Node identity. Ordering is Bank < Service < Hazard, then by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "id")]
pub enum NodeKey {
    Bank(BankId),
    Service(ServiceId),
    Hazard(HazardId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Bank,
    Service,
    Hazard,
}

impl NodeKey {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeKey::Bank(_) => NodeKind::Bank,
            NodeKey::Service(_) => NodeKind::Service,
            NodeKey::Hazard(_) => NodeKind::Hazard,
        }
    }

    pub fn is_bank(&self) -> bool {
        matches!(self, NodeKey::Bank(_))
    }

    pub fn as_bank(&self) -> Option<&BankId> {
        match self {
            NodeKey::Bank(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Bank(id) => write!(f, "bank:{}", id),
            NodeKey::Service(id) => write!(f, "service:{}", id),
            NodeKey::Hazard(id) => write!(f, "hazard:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub key: NodeKey,

    /// Only set on bank nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footprint: Option<FootprintScore>,
}

// ============================================================================
// EDGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EdgeKind {
    /// Bank - Service, weight = dependency score.
    Dependency,
    /// Bank - Hazard, weight = hazard exposure score.
    HazardExposure,
    /// Service - Hazard, weight = co-occurrence coefficient.
    Cooccurrence,
}

/// Undirected edge between node indices, `source < target`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
    pub weight: f64,
}

// ============================================================================
// NETWORK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundRiskNetwork {
    nodes: Vec<Node>,
    edges: Vec<Edge>,

    #[serde(skip)]
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl CompoundRiskNetwork {
    /// Assemble and check a network.
    ///
    /// Nodes must be sorted and unique by key. Every edge must join two
    /// distinct existing nodes at most once, with a finite weight >= 0.
    pub(crate) fn from_parts(nodes: Vec<Node>, mut edges: Vec<Edge>) -> RiskResult<Self> {
        if nodes.is_empty() {
            return Err(RiskError::EmptyNetwork);
        }
        debug_assert!(nodes.windows(2).all(|w| w[0].key < w[1].key));

        let n = nodes.len();
        let mut seen = BTreeSet::new();
        for edge in edges.iter_mut() {
            if edge.source > edge.target {
                std::mem::swap(&mut edge.source, &mut edge.target);
            }
            if edge.target >= n || edge.source == edge.target {
                return Err(RiskError::dimension_mismatch(
                    "network edge endpoints",
                    [format!("distinct nodes below {}", n)],
                    [format!("{} - {}", edge.source, edge.target)],
                ));
            }
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(RiskError::invalid_weight(
                    format!("edge {} - {}", nodes[edge.source].key, nodes[edge.target].key),
                    "edge weight must be finite and non-negative",
                    edge.weight,
                ));
            }
            if !seen.insert((edge.source, edge.target)) {
                return Err(RiskError::dimension_mismatch(
                    "network: duplicate edge",
                    Vec::<String>::new(),
                    [format!("{} - {}", nodes[edge.source].key, nodes[edge.target].key)],
                ));
            }
        }
        edges.sort_by(|a, b| (a.source, a.target).cmp(&(b.source, b.target)));

        let mut adjacency = vec![Vec::new(); n];
        for edge in &edges {
            adjacency[edge.source].push((edge.target, edge.weight));
            adjacency[edge.target].push((edge.source, edge.weight));
        }
        for list in adjacency.iter_mut() {
            list.sort_by_key(|(j, _)| *j);
        }

        Ok(CompoundRiskNetwork {
            nodes,
            edges,
            adjacency,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn key(&self, index: usize) -> &NodeKey {
        &self.nodes[index].key
    }

    pub fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.key.cmp(key)).ok()
    }

    /// Neighbours of a node with edge weights, by ascending node index.
    pub fn neighbors(&self, index: usize) -> &[(usize, f64)] {
        &self.adjacency[index]
    }

    pub fn edge_weight(&self, a: usize, b: usize) -> Option<f64> {
        self.adjacency
            .get(a)?
            .iter()
            .find(|(j, _)| *j == b)
            .map(|(_, w)| *w)
    }

    /// Sum of incident edge weights.
    pub fn weighted_degree(&self, index: usize) -> f64 {
        self.adjacency[index].iter().map(|(_, w)| w).sum()
    }

    /// True when no incident edge carries positive weight.
    pub fn is_isolated(&self, index: usize) -> bool {
        self.adjacency[index].iter().all(|(_, w)| *w <= 0.0)
    }

    /// Bank node indices in bank-id order.
    pub fn bank_indices(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|i| self.nodes[*i].key.is_bank()).collect()
    }

    pub fn bank_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.key.is_bank()).count()
    }

    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Edge count per edge kind.
    pub fn edge_kind_counts(&self) -> BTreeMap<EdgeKind, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.kind).or_insert(0) += 1;
        }
        counts
    }

    /// SHA-256 over node keys and edge weights. Identical inputs give an
    /// identical fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for node in &self.nodes {
            hasher.update(format!("n|{}\n", node.key));
        }
        for edge in &self.edges {
            hasher.update(format!(
                "e|{}|{}|{:?}|{:016x}\n",
                self.nodes[edge.source].key,
                self.nodes[edge.target].key,
                edge.kind,
                edge.weight.to_bits()
            ));
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn summary(&self) -> String {
        let counts = self.edge_kind_counts();
        format!(
            "Network: {} nodes ({} banks), {} edges ({} dependency, {} hazard, {} co-occurrence)",
            self.node_count(),
            self.bank_count(),
            self.edge_count(),
            counts.get(&EdgeKind::Dependency).copied().unwrap_or(0),
            counts.get(&EdgeKind::HazardExposure).copied().unwrap_or(0),
            counts.get(&EdgeKind::Cooccurrence).copied().unwrap_or(0),
        )
    }
}
