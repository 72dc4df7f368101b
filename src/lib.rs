// Eco Risk Network - Core Library
// Compound nature/climate risk engine: exposure -> scores -> network -> analysis

pub mod types;
pub mod error;
pub mod reference;
pub mod exposure;
pub mod supply_chain;   // Upstream (Leontief) adjustment
mod aggregation;
pub mod dependency;
pub mod hazard;
pub mod footprint;
pub mod network;
pub mod analysis;
pub mod config;
pub mod loader;         // CSV / JSON plumbing, not used by the engine itself
pub mod pipeline;

// Re-export commonly used types
pub use types::{ActivityId, BankId, HazardId, ServiceId, WEIGHT_TOLERANCE};
pub use error::{RiskError, RiskResult};
pub use reference::{
    CooccurrenceTable, HazardSensitivity, IntensityTable, Matrix, ReferenceData, ServiceCoefficients,
};
pub use exposure::{Bank, ExposureMatrix, LoanRecord};
pub use supply_chain::SupplyChain;
pub use dependency::{DependencyEngine, DependencyMatrix};
pub use hazard::{assess_hazard_exposure, HazardExposureMatrix};
pub use footprint::{FootprintEstimator, FootprintScore, FootprintTable, FootprintWeights};
pub use network::{CompoundRiskNetwork, Edge, EdgeKind, NetworkBuilder, Node, NodeKey, NodeKind};
pub use analysis::{
    AnalysisReport, BankStress, BridgingScore, CascadeConfig, CommunityAssignment, CompoundExposure,
    NetworkAnalyzer, RiskPropagationResult, SeverityThreshold,
};
pub use config::EngineConfig;
pub use loader::InputManifest;
pub use pipeline::{PipelineReport, RiskPipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
