// 🧱 Compound Risk Network Builder
//
// Edge policy:
//   Bank - Service   weight = dependency score
//   Bank - Hazard    weight = hazard exposure score
//   Service - Hazard weight = co-occurrence coefficient (listed or derived)
//
// Zero scores produce no edge. Nodes are kept regardless, so a bank with no
// exposure still shows up (isolated) in the analytics.

use super::{CompoundRiskNetwork, Edge, EdgeKind, Node, NodeKey};
use crate::dependency::DependencyMatrix;
use crate::error::{RiskError, RiskResult};
use crate::footprint::FootprintTable;
use crate::hazard::HazardExposureMatrix;
use crate::reference::CooccurrenceTable;
use crate::types::{BankId, HazardId, ServiceId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct NetworkBuilder<'a> {
    cooccurrence: Option<&'a CooccurrenceTable>,

    /// Derive Service - Hazard weights from bank scores when no table is given.
    derive_cooccurrence: bool,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new() -> Self {
        NetworkBuilder {
            cooccurrence: None,
            derive_cooccurrence: false,
        }
    }

    pub fn with_cooccurrence(mut self, table: &'a CooccurrenceTable) -> Self {
        self.cooccurrence = Some(table);
        self
    }

    pub fn derive_cooccurrence(mut self, enabled: bool) -> Self {
        self.derive_cooccurrence = enabled;
        self
    }

    pub fn build(
        &self,
        dependency: &DependencyMatrix,
        hazard: &HazardExposureMatrix,
        footprint: &FootprintTable,
    ) -> RiskResult<CompoundRiskNetwork> {
        let services: BTreeSet<&ServiceId> = dependency.cols().iter().collect();
        let hazards: BTreeSet<&HazardId> = hazard.cols().iter().collect();

        let mut keys: BTreeSet<NodeKey> = BTreeSet::new();
        keys.extend(dependency.rows().iter().cloned().map(NodeKey::Bank));
        keys.extend(hazard.rows().iter().cloned().map(NodeKey::Bank));
        keys.extend(footprint.bank_ids().cloned().map(NodeKey::Bank));
        keys.extend(services.iter().map(|s| NodeKey::Service((*s).clone())));
        keys.extend(hazards.iter().map(|h| NodeKey::Hazard((*h).clone())));

        if keys.is_empty() {
            return Err(RiskError::EmptyNetwork);
        }

        let cooccurrence: BTreeMap<(ServiceId, HazardId), f64> = match (self.cooccurrence, self.derive_cooccurrence) {
            (Some(table), _) => {
                for (service, hazard_id, _) in table.iter() {
                    if !services.contains(service) || !hazards.contains(hazard_id) {
                        return Err(RiskError::dimension_mismatch(
                            "co-occurrence pair outside network",
                            services
                                .iter()
                                .map(|s| s.to_string())
                                .chain(hazards.iter().map(|h| h.to_string())),
                            [format!("{}/{}", service, hazard_id)],
                        ));
                    }
                }
                table
                    .iter()
                    .map(|(s, h, v)| ((s.clone(), h.clone()), v))
                    .collect()
            }
            (None, true) => derived_cooccurrence(dependency, hazard),
            (None, false) => BTreeMap::new(),
        };

        let nodes: Vec<Node> = keys
            .into_iter()
            .map(|key| {
                let footprint = key.as_bank().and_then(|b| footprint.get(b)).cloned();
                Node { key, footprint }
            })
            .collect();
        let edges = {
            let index: BTreeMap<&NodeKey, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.key, i)).collect();
            let lookup = |key: NodeKey| -> usize { index[&key] };

            let mut edges = Vec::new();
            for (bank, service, weight) in dependency.entries() {
                if weight > 0.0 {
                    edges.push(Edge {
                        source: lookup(NodeKey::Bank(bank.clone())),
                        target: lookup(NodeKey::Service(service.clone())),
                        kind: EdgeKind::Dependency,
                        weight,
                    });
                }
            }
            for (bank, hazard_id, weight) in hazard.entries() {
                if weight > 0.0 {
                    edges.push(Edge {
                        source: lookup(NodeKey::Bank(bank.clone())),
                        target: lookup(NodeKey::Hazard(hazard_id.clone())),
                        kind: EdgeKind::HazardExposure,
                        weight,
                    });
                }
            }
            for ((service, hazard_id), weight) in cooccurrence {
                if weight > 0.0 {
                    edges.push(Edge {
                        source: lookup(NodeKey::Service(service)),
                        target: lookup(NodeKey::Hazard(hazard_id)),
                        kind: EdgeKind::Cooccurrence,
                        weight,
                    });
                }
            }
            edges
        };
        let network = CompoundRiskNetwork::from_parts(nodes, edges)?;
        info!(
            nodes = network.node_count(),
            edges = network.edge_count(),
            fingerprint = %network.fingerprint(),
            "Compound risk network built"
        );
        Ok(network)
    }
}

impl Default for NetworkBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean over banks of dependency × hazard exposure for every (service, hazard).
fn derived_cooccurrence(
    dependency: &DependencyMatrix,
    hazard: &HazardExposureMatrix,
) -> BTreeMap<(ServiceId, HazardId), f64> {
    let banks: Vec<&BankId> = dependency
        .rows()
        .iter()
        .filter(|b| hazard.row_index(b).is_some())
        .collect();

    let mut out = BTreeMap::new();
    if banks.is_empty() {
        return out;
    }

    for service in dependency.cols() {
        for hazard_id in hazard.cols() {
            let sum: f64 = banks
                .iter()
                .map(|b| {
                    dependency.get(b, service).unwrap_or(0.0) * hazard.get(b, hazard_id).unwrap_or(0.0)
                })
                .sum();
            let mean = sum / banks.len() as f64;
            if mean > 0.0 {
                out.insert((service.clone(), hazard_id.clone()), mean);
            }
        }
    }

    debug!(pairs = out.len(), "Derived service-hazard co-occurrence");
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Matrix;

    fn dependency() -> DependencyMatrix {
        Matrix::from_rows(
            "dependency",
            vec![
                (BankId::from("BankA"), vec![(ServiceId::from("pollination"), 0.66)]),
                (BankId::from("BankB"), vec![(ServiceId::from("pollination"), 0.26)]),
                (BankId::from("BankC"), vec![(ServiceId::from("pollination"), 0.0)]),
            ],
        )
        .unwrap()
    }

    fn hazard() -> HazardExposureMatrix {
        Matrix::from_rows(
            "hazard",
            vec![
                (BankId::from("BankA"), vec![(HazardId::from("floods"), 0.5)]),
                (BankId::from("BankB"), vec![(HazardId::from("floods"), 0.0)]),
                (BankId::from("BankC"), vec![(HazardId::from("floods"), 0.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_keeps_zero_exposure_banks() {
        let net = NetworkBuilder::new()
            .build(&dependency(), &hazard(), &FootprintTable::default())
            .unwrap();

        assert_eq!(net.node_count(), 5);
        assert_eq!(net.edge_count(), 3);
        let c = net.index_of(&NodeKey::Bank("BankC".into())).unwrap();
        assert!(net.is_isolated(c));
    }

    #[test]
    fn test_edge_weights_follow_scores() {
        let net = NetworkBuilder::new()
            .build(&dependency(), &hazard(), &FootprintTable::default())
            .unwrap();
        let a = net.index_of(&NodeKey::Bank("BankA".into())).unwrap();
        let s = net.index_of(&NodeKey::Service("pollination".into())).unwrap();
        let h = net.index_of(&NodeKey::Hazard("floods".into())).unwrap();
        assert_eq!(net.edge_weight(a, s), Some(0.66));
        assert_eq!(net.edge_weight(a, h), Some(0.5));
        assert_eq!(net.edge_weight(s, h), None);
    }

    #[test]
    fn test_listed_cooccurrence_adds_edge() {
        let table = CooccurrenceTable::new(vec![("pollination".into(), "floods".into(), 0.3)]).unwrap();
        let net = NetworkBuilder::new()
            .with_cooccurrence(&table)
            .build(&dependency(), &hazard(), &FootprintTable::default())
            .unwrap();
        let s = net.index_of(&NodeKey::Service("pollination".into())).unwrap();
        let h = net.index_of(&NodeKey::Hazard("floods".into())).unwrap();
        assert_eq!(net.edge_weight(s, h), Some(0.3));
    }

    #[test]
    fn test_unknown_cooccurrence_pair_is_rejected() {
        let table = CooccurrenceTable::new(vec![("water".into(), "floods".into(), 0.3)]).unwrap();
        let err = NetworkBuilder::new()
            .with_cooccurrence(&table)
            .build(&dependency(), &hazard(), &FootprintTable::default())
            .unwrap_err();
        assert!(matches!(err, RiskError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_derived_cooccurrence_is_mean_product() {
        let net = NetworkBuilder::new()
            .derive_cooccurrence(true)
            .build(&dependency(), &hazard(), &FootprintTable::default())
            .unwrap();
        let s = net.index_of(&NodeKey::Service("pollination".into())).unwrap();
        let h = net.index_of(&NodeKey::Hazard("floods".into())).unwrap();
        let expected = 0.66 * 0.5 / 3.0;
        assert!((net.edge_weight(s, h).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        let dep: DependencyMatrix = Matrix::zeros(Vec::<BankId>::new(), Vec::<ServiceId>::new());
        let haz: HazardExposureMatrix = Matrix::zeros(Vec::<BankId>::new(), Vec::<HazardId>::new());
        let err = NetworkBuilder::new().build(&dep, &haz, &FootprintTable::default()).unwrap_err();
        assert_eq!(err, RiskError::EmptyNetwork);
    }

    #[test]
    fn test_rebuild_is_identical() {
        let a = NetworkBuilder::new().build(&dependency(), &hazard(), &FootprintTable::default()).unwrap();
        let b = NetworkBuilder::new().build(&dependency(), &hazard(), &FootprintTable::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
