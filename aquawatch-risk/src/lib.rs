//! Outbreak risk scoring for water-borne disease surveillance.
//!
//! Two interchangeable strategies share one output contract
//! ([`RiskAssessment`]): deterministic rules over water chemistry and
//! context, and a logistic model trained on synthetic field data. The
//! model strategy falls back to the rules whenever no trained artifact is
//! active.

pub mod error;
pub mod features;
pub mod model;
pub mod registry;
pub mod rules;
pub mod scorer;
pub mod synthetic;

pub use error::RiskError;
pub use features::FeatureVector;
pub use registry::ModelRegistry;
pub use rules::{ContaminationLevel, RiskLevel};
pub use scorer::{FactorContribution, ModelScorer, RiskAssessment, RiskScorer, RuleBasedScorer, Strategy};
