//! Turn a village risk assessment into alerts.

use serde::Serialize;
use uuid::Uuid;

use aquawatch_risk::{ContaminationLevel, FeatureVector, RiskAssessment, RiskLevel, RiskScorer};
use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::models::{Alert, AlertType, ScopeIds, Severity};
use crate::services::alert_service::{self, AlertDraft};
use crate::store::Repository;

const SOURCE_KIND: &str = "risk_assessment";

#[derive(Debug, Serialize)]
pub struct VillageRisk {
    pub village_id: i32,
    pub assessment: RiskAssessment,
    pub alerts: Vec<Alert>,
}

pub fn severity_for_level(level: RiskLevel) -> Severity {
    match level {
        RiskLevel::Low => Severity::Low,
        RiskLevel::Medium => Severity::Medium,
        RiskLevel::High => Severity::High,
        RiskLevel::Critical => Severity::Critical,
    }
}

/// Only HIGH_RISK and UNSAFE water raise an alert.
pub fn severity_for_contamination(level: ContaminationLevel) -> Option<Severity> {
    match level {
        ContaminationLevel::Unsafe => Some(Severity::Critical),
        ContaminationLevel::HighRisk => Some(Severity::High),
        _ => None,
    }
}

/// Score `features` for a village and, when `raise_alerts` is set, create an
/// OUTBREAK_PREDICTED alert at or above `outbreak_threshold` and a
/// WATER_CONTAMINATION alert for high-risk water. Raised alerts are
/// attributed to `requested_by`.
pub fn assess_village<R>(
    repo: &R,
    scorer: &dyn RiskScorer,
    outbreak_threshold: f64,
    village_id: i32,
    features: &FeatureVector,
    raise_alerts: bool,
    requested_by: Option<Uuid>,
) -> AppResult<VillageRisk>
where
    R: Repository + ?Sized,
{
    // fail on unknown villages before scoring
    let scope = alert_service::normalize_scope(repo, ScopeIds { village_id: Some(village_id), ..Default::default() })?;

    let assessment = scorer
        .assess(features)
        .map_err(|e| AppError::new(ErrorCode::InvalidFeatures, e.to_string()))?;

    metrics::counter!("risk_assessments_total", "strategy" => assessment.strategy.label()).increment(1);
    tracing::info!(
        village_id,
        probability = assessment.probability,
        level = %assessment.level,
        contamination = %assessment.contamination,
        strategy = assessment.strategy.label(),
        "risk assessed"
    );

    let mut alerts = Vec::new();
    if raise_alerts {
        let data = serde_json::json!({
            "probability": assessment.probability,
            "confidence": assessment.confidence,
            "risk_level": assessment.level,
            "contamination": assessment.contamination,
            "strategy": assessment.strategy,
            "features": features,
        });

        if assessment.probability >= outbreak_threshold {
            alerts.push(alert_service::create_alert(
                repo,
                AlertDraft {
                    alert_type: AlertType::OutbreakPredicted,
                    severity: severity_for_level(assessment.level),
                    title: "Outbreak risk predicted".into(),
                    message: format!(
                        "Predicted outbreak probability {:.0}% ({} risk)",
                        assessment.probability * 100.0,
                        assessment.level
                    ),
                    description: String::new(),
                    scope,
                    source_kind: Some(SOURCE_KIND.into()),
                    source_id: None,
                    threshold_value: Some(outbreak_threshold),
                    actual_value: Some(assessment.probability),
                    alert_data: data.clone(),
                    expires_at: None,
                },
                requested_by,
            )?);
        }

        if let Some(severity) = severity_for_contamination(assessment.contamination) {
            alerts.push(alert_service::create_alert(
                repo,
                AlertDraft {
                    alert_type: AlertType::WaterContamination,
                    severity,
                    title: "Water contamination detected".into(),
                    message: format!(
                        "Water quality is {} (E. coli {} per 100ml, turbidity {} NTU, pH {})",
                        assessment.contamination,
                        features.ecoli_per_100ml,
                        features.turbidity_ntu,
                        features.water_ph
                    ),
                    description: String::new(),
                    scope,
                    source_kind: Some(SOURCE_KIND.into()),
                    source_id: None,
                    threshold_value: None,
                    actual_value: Some(features.ecoli_per_100ml),
                    alert_data: data,
                    expires_at: None,
                },
                requested_by,
            )?);
        }
    }

    Ok(VillageRisk { village_id, assessment, alerts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::geography;
    use crate::store::AlertStore;
    use aquawatch_risk::RuleBasedScorer;

    fn features(json: serde_json::Value) -> FeatureVector {
        serde_json::from_value(json).unwrap()
    }

    fn clean() -> FeatureVector {
        features(serde_json::json!({
            "water_ph": 7.2,
            "turbidity_ntu": 0.5,
            "ecoli_per_100ml": 0.0,
            "temperature_celsius": 20.0,
            "population_density": 100.0,
            "sanitation_score": 5.0,
            "month": 1,
        }))
    }

    fn polluted() -> FeatureVector {
        features(serde_json::json!({
            "water_ph": 5.5,
            "turbidity_ntu": 20.0,
            "ecoli_per_100ml": 500.0,
            "total_coliform": 2000.0,
            "temperature_celsius": 32.0,
            "rainfall_mm_7d": 180.0,
            "population_density": 5000.0,
            "sanitation_score": 0.0,
            "distance_to_healthcare_km": 60.0,
            "previous_outbreak": true,
            "is_monsoon": true,
            "month": 7,
        }))
    }

    #[test]
    fn clean_water_raises_nothing() {
        let store = geography();
        let risk = assess_village(&store, &RuleBasedScorer, 0.7, 111, &clean(), true, None).unwrap();
        assert_eq!(risk.assessment.level, RiskLevel::Low);
        assert!(risk.alerts.is_empty());
    }

    #[test]
    fn polluted_water_raises_both_alerts() {
        let store = geography();
        let officer = Uuid::new_v4();
        let risk =
            assess_village(&store, &RuleBasedScorer, 0.7, 111, &polluted(), true, Some(officer)).unwrap();

        assert_eq!(risk.alerts.len(), 2);
        let outbreak = &risk.alerts[0];
        assert_eq!(outbreak.alert_type, AlertType::OutbreakPredicted);
        assert_eq!(outbreak.severity, Severity::Critical);
        assert_eq!(outbreak.district_id, Some(11));

        let water = &risk.alerts[1];
        assert_eq!(water.alert_type, AlertType::WaterContamination);
        assert_eq!(water.severity, Severity::Critical);
        assert_eq!(water.alert_data["contamination"], "UNSAFE");
        assert!(risk.alerts.iter().all(|a| a.created_by == Some(officer)));
    }

    #[test]
    fn preview_only_creates_nothing() {
        let store = geography();
        let risk = assess_village(&store, &RuleBasedScorer, 0.7, 111, &polluted(), false, None).unwrap();
        assert!(risk.alerts.is_empty());
        assert_eq!(store.list_alerts(&Default::default(), 10, 0).unwrap().1, 0);
    }

    #[test]
    fn bad_features_and_villages_are_rejected() {
        let store = geography();
        let bad = FeatureVector { month: 13, ..clean() };
        let err = assess_village(&store, &RuleBasedScorer, 0.7, 111, &bad, true, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidFeatures));

        let err = assess_village(&store, &RuleBasedScorer, 0.7, 999, &clean(), true, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VillageNotFound));
    }

    #[test]
    fn contamination_mapping() {
        assert_eq!(severity_for_contamination(ContaminationLevel::ModerateRisk), None);
        assert_eq!(severity_for_contamination(ContaminationLevel::HighRisk), Some(Severity::High));
        assert_eq!(severity_for_level(RiskLevel::Medium), Severity::Medium);
    }
}
