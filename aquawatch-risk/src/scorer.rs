use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::RiskResult;
use crate::features::FeatureVector;
use crate::registry::{ModelArtifact, ModelRegistry};
use crate::rules::{self, ContaminationLevel, RiskFactors, RiskLevel};

/// Which strategy produced an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    RuleBased,
    Model { version: u32 },
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::RuleBased => "rule_based",
            Strategy::Model { .. } => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub name: String,
    /// Sub-score in [0, 1] for rules, standardised value for the model.
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Output shared by every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub probability: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub contamination: ContaminationLevel,
    pub high_risk_markers: bool,
    pub factors: Vec<FactorContribution>,
    pub strategy: Strategy,
}

impl RiskAssessment {
    fn build(fv: &FeatureVector, probability: f64, factors: Vec<FactorContribution>, strategy: Strategy) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            probability,
            level: RiskLevel::from_probability(probability),
            confidence: probability.max(1.0 - probability),
            contamination: rules::contamination_level(fv),
            high_risk_markers: rules::is_high_risk(fv),
            factors,
            strategy,
        }
    }
}

pub trait RiskScorer: Send + Sync {
    fn assess(&self, features: &FeatureVector) -> RiskResult<RiskAssessment>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl RiskScorer for RuleBasedScorer {
    fn assess(&self, features: &FeatureVector) -> RiskResult<RiskAssessment> {
        features.validate()?;
        let factors = RiskFactors::from_features(features);
        let breakdown = factors
            .weighted()
            .iter()
            .map(|(name, score, weight)| FactorContribution {
                name: name.to_string(),
                value: *score,
                weight: *weight,
                contribution: score * weight,
            })
            .collect();
        Ok(RiskAssessment::build(
            features,
            factors.outbreak_score(),
            breakdown,
            Strategy::RuleBased,
        ))
    }
}

/// Scores with the registry's active model, falling back to rules when no
/// usable model is active.
pub struct ModelScorer {
    registry: ModelRegistry,
    fallback: RuleBasedScorer,
    loaded: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelScorer {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            fallback: RuleBasedScorer,
            loaded: RwLock::new(None),
        }
    }

    /// Resolve the active artifact, reloading only when the pointer moved.
    fn active_model(&self) -> Option<Arc<ModelArtifact>> {
        let version = match self.registry.active_version() {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read active model version");
                return None;
            }
        };

        {
            let cached = self.loaded.read().unwrap_or_else(|e| e.into_inner());
            if let Some(artifact) = cached.as_ref().filter(|a| a.version == version) {
                return Some(artifact.clone());
            }
        }

        match self.registry.load(version) {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                *self.loaded.write().unwrap_or_else(|e| e.into_inner()) = Some(artifact.clone());
                tracing::info!(version, "outbreak model loaded");
                Some(artifact)
            }
            Err(e) => {
                tracing::warn!(version, error = %e, "active model unusable");
                None
            }
        }
    }
}

impl RiskScorer for ModelScorer {
    fn assess(&self, features: &FeatureVector) -> RiskResult<RiskAssessment> {
        features.validate()?;

        let Some(artifact) = self.active_model() else {
            tracing::debug!("no active model, using rule-based scoring");
            return self.fallback.assess(features);
        };

        let mut breakdown: Vec<FactorContribution> = artifact
            .model
            .contributions(features)
            .into_iter()
            .map(|(name, weight, contribution)| FactorContribution {
                name: name.to_string(),
                value: if weight.abs() > f64::EPSILON { contribution / weight } else { 0.0 },
                weight,
                contribution,
            })
            .collect();
        breakdown.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

        Ok(RiskAssessment::build(
            features,
            artifact.model.predict_proba(features),
            breakdown,
            Strategy::Model { version: artifact.version },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::clean_sample;
    use crate::registry::tests::quick_artifact;
    use tempfile::tempdir;

    fn worst_case() -> FeatureVector {
        FeatureVector {
            water_ph: 5.5,
            turbidity_ntu: 25.0,
            ecoli_per_100ml: 800.0,
            total_coliform: 2_000.0,
            temperature_celsius: 35.0,
            rainfall_mm_7d: 250.0,
            population_density: 5_000.0,
            sanitation_score: 0.0,
            distance_to_healthcare_km: 80.0,
            previous_outbreak: true,
            is_monsoon: true,
            month: 7,
        }
    }

    #[test]
    fn rule_based_contract() {
        let assessment = RuleBasedScorer.assess(&worst_case()).unwrap();
        assert_eq!(assessment.strategy, Strategy::RuleBased);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert_eq!(assessment.contamination, ContaminationLevel::Unsafe);
        assert!(assessment.high_risk_markers);
        assert_eq!(assessment.factors.len(), 5);

        let sum: f64 = assessment.factors.iter().map(|f| f.contribution).sum();
        assert!((sum - assessment.probability).abs() < 1e-9);
    }

    #[test]
    fn clean_sample_is_low() {
        let assessment = RuleBasedScorer.assess(&clean_sample()).unwrap();
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.contamination, ContaminationLevel::Safe);
        assert!(assessment.confidence > 0.9);
    }

    #[test]
    fn invalid_features_are_rejected() {
        let fv = FeatureVector { month: 0, ..clean_sample() };
        assert!(RuleBasedScorer.assess(&fv).is_err());
    }

    #[test]
    fn model_scorer_falls_back_without_active_model() {
        let tmp = tempdir().unwrap();
        let scorer = ModelScorer::new(ModelRegistry::new(tmp.path()));

        let assessment = scorer.assess(&worst_case()).unwrap();
        assert_eq!(assessment.strategy, Strategy::RuleBased);
        assert_eq!(assessment, RuleBasedScorer.assess(&worst_case()).unwrap());
    }

    #[test]
    fn model_scorer_follows_active_pointer() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());
        registry.save(&quick_artifact(1)).unwrap();
        registry.save(&quick_artifact(2)).unwrap();
        registry.activate(1).unwrap();

        let scorer = ModelScorer::new(registry.clone());
        let first = scorer.assess(&clean_sample()).unwrap();
        assert_eq!(first.strategy, Strategy::Model { version: 1 });
        assert_eq!(first.factors.len(), 12);
        assert!((0.0..=1.0).contains(&first.probability));
        assert!(first.confidence >= 0.5);

        registry.activate(2).unwrap();
        let second = scorer.assess(&clean_sample()).unwrap();
        assert_eq!(second.strategy, Strategy::Model { version: 2 });
    }

    #[test]
    fn broken_artifact_falls_back_to_rules() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());
        registry.save(&quick_artifact(1)).unwrap();
        registry.activate(1).unwrap();
        std::fs::write(tmp.path().join("outbreak_model_v1.json"), b"{ not json").unwrap();

        let assessment = ModelScorer::new(registry).assess(&clean_sample()).unwrap();
        assert_eq!(assessment.strategy, Strategy::RuleBased);
    }

    #[test]
    fn short_scaler_falls_back_to_rules() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());
        let mut artifact = quick_artifact(1);
        artifact.model.scaler.means.truncate(3);
        artifact.model.scaler.stds.truncate(3);
        registry.save(&artifact).unwrap();
        registry.activate(1).unwrap();

        let assessment = ModelScorer::new(registry).assess(&worst_case()).unwrap();
        assert_eq!(assessment.strategy, Strategy::RuleBased);
        assert_eq!(assessment, RuleBasedScorer.assess(&worst_case()).unwrap());
    }

    #[test]
    fn strategy_serializes_with_kind_tag() {
        let json = serde_json::to_value(Strategy::Model { version: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "model", "version": 4 }));
        assert_eq!(Strategy::RuleBased.label(), "rule_based");
    }
}
