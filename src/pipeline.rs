// 🚀 Risk Pipeline - exposure -> scores -> network -> analysis
//
// One batch run over validated in-memory tables. Every stage validates its
// inputs before computing, so a bad table stops the run before any score
// is produced.

use crate::analysis::{AnalysisReport, NetworkAnalyzer};
use crate::config::EngineConfig;
use crate::dependency::{DependencyEngine, DependencyMatrix};
use crate::error::RiskResult;
use crate::exposure::ExposureMatrix;
use crate::footprint::{FootprintEstimator, FootprintTable};
use crate::hazard::{assess_hazard_exposure, HazardExposureMatrix};
use crate::network::{CompoundRiskNetwork, NetworkBuilder};
use crate::reference::ReferenceData;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub config: EngineConfig,
    pub dependency: DependencyMatrix,
    pub hazard_exposure: HazardExposureMatrix,
    pub footprint: FootprintTable,
    pub network: CompoundRiskNetwork,
    pub network_fingerprint: String,
    pub analysis: AnalysisReport,
}

impl PipelineReport {
    pub fn summary(&self) -> String {
        format!(
            "Run {} at {}\n{}\n{}\n{}",
            self.run_id,
            self.computed_at.to_rfc3339(),
            self.footprint.summary(),
            self.network.summary(),
            self.analysis.summary()
        )
    }
}

pub struct RiskPipeline {
    config: EngineConfig,
    analyzer: NetworkAnalyzer,
}

impl RiskPipeline {
    pub fn new(config: EngineConfig) -> RiskResult<Self> {
        config.validate()?;
        let analyzer = NetworkAnalyzer::new(config.cascade())?;
        Ok(RiskPipeline { config, analyzer })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, exposure: &ExposureMatrix, reference: &ReferenceData) -> RiskResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        info!(%run_id, banks = exposure.len(), "Risk pipeline started");

        let supply_chain = reference.supply_chain.as_ref();

        let dependency_engine = match supply_chain {
            Some(chain) => DependencyEngine::with_supply_chain(chain),
            None => DependencyEngine::new(),
        };
        let dependency = dependency_engine.assess(exposure, &reference.service_dependency)?;
        let hazard_exposure = assess_hazard_exposure(exposure, &reference.hazard_sensitivity)?;

        let mut estimator = FootprintEstimator::with_weights(self.config.footprint)?;
        if let Some(chain) = supply_chain {
            estimator = estimator.supply_chain(chain);
        }
        let footprint = estimator.estimate(exposure, &reference.emissions, &reference.land_use)?;

        let mut builder = NetworkBuilder::new().derive_cooccurrence(self.config.derive_cooccurrence);
        if let Some(table) = reference.cooccurrence.as_ref() {
            builder = builder.with_cooccurrence(table);
        }
        let network = builder.build(&dependency, &hazard_exposure, &footprint)?;
        let network_fingerprint = network.fingerprint();

        let analysis = self.analyzer.analyze(&network);

        info!(
            %run_id,
            stressed = analysis.propagation.stressed_count,
            converged = analysis.propagation.converged,
            "Risk pipeline finished"
        );

        Ok(PipelineReport {
            run_id,
            computed_at: Utc::now(),
            config: self.config.clone(),
            dependency,
            hazard_exposure,
            footprint,
            network,
            network_fingerprint,
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::exposure::Bank;
    use crate::reference::{IntensityTable, Matrix};
    use crate::types::ActivityId;

    fn reference() -> ReferenceData {
        ReferenceData {
            service_dependency: Matrix::from_rows(
                "service dependency",
                vec![
                    (ActivityId::from("agriculture"), vec![("pollination".into(), 0.8)]),
                    (ActivityId::from("mining"), vec![("pollination".into(), 0.1)]),
                ],
            )
            .unwrap(),
            hazard_sensitivity: Matrix::from_rows(
                "hazard sensitivity",
                vec![
                    (ActivityId::from("agriculture"), vec![("floods".into(), 0.5)]),
                    (ActivityId::from("mining"), vec![("floods".into(), 0.2)]),
                ],
            )
            .unwrap(),
            emissions: IntensityTable::new("emissions", vec![("agriculture".into(), 1.0), ("mining".into(), 3.0)])
                .unwrap(),
            land_use: IntensityTable::new("land use", vec![("agriculture".into(), 2.0), ("mining".into(), 1.0)])
                .unwrap(),
            cooccurrence: None,
            supply_chain: None,
        }
    }

    fn exposure() -> ExposureMatrix {
        ExposureMatrix::new(vec![
            Bank::new("BankA", 100.0, vec![("agriculture".into(), 0.8), ("mining".into(), 0.2)]).unwrap(),
            Bank::new("BankB", 50.0, vec![("agriculture".into(), 0.2), ("mining".into(), 0.8)]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_pipeline_runs_all_stages() {
        let report = RiskPipeline::new(EngineConfig::new(0.1)).unwrap().run(&exposure(), &reference()).unwrap();

        // BankA: 0.8*0.8 + 0.2*0.1 = 0.66
        let dep = report.dependency.get(&"BankA".into(), &"pollination".into()).unwrap();
        assert!((dep - 0.66).abs() < 1e-12);
        assert_eq!(report.network.bank_count(), 2);
        assert_eq!(report.network_fingerprint, report.network.fingerprint());
        assert_eq!(report.analysis.rankings[0].bank.as_str(), "BankA");
        assert!(report.summary().contains("Network:"));
    }

    #[test]
    fn test_pipeline_fails_fast_on_activity_mismatch() {
        let mut reference = reference();
        reference.emissions = IntensityTable::new("emissions", vec![("agriculture".into(), 1.0)]).unwrap();
        let err = RiskPipeline::new(EngineConfig::new(0.1)).unwrap().run(&exposure(), &reference).unwrap_err();
        assert!(matches!(err, RiskError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        assert!(RiskPipeline::new(EngineConfig::new(f64::NAN)).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let report = RiskPipeline::new(EngineConfig::new(0.1)).unwrap().run(&exposure(), &reference()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["analysis"]["propagation"]["stressed_fraction"].is_number());
        assert_eq!(json["network_fingerprint"].as_str().map(str::len), Some(64));
    }
}
