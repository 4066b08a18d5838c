use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use aquawatch_risk::FeatureVector;
use aquawatch_shared::errors::AppResult;
use aquawatch_shared::middleware::OfficerUser;
use aquawatch_shared::types::api::ApiResponse;

use crate::events::publisher;
use crate::services::risk_service::{self, VillageRisk};
use crate::AppState;

fn default_raise_alerts() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub village_id: i32,
    pub features: FeatureVector,
    /// `false` scores without creating alerts.
    #[serde(default = "default_raise_alerts")]
    pub raise_alerts: bool,
}

/// POST /risk/assess
pub async fn assess(
    State(state): State<Arc<AppState>>,
    OfficerUser(officer): OfficerUser,
    Json(req): Json<AssessRequest>,
) -> AppResult<Json<ApiResponse<VillageRisk>>> {
    tracing::debug!(village_id = req.village_id, requested_by = %officer.id, "risk assessment requested");

    let risk = risk_service::assess_village(
        state.repo.as_ref(),
        state.scorer.as_ref(),
        state.config.outbreak_alert_threshold,
        req.village_id,
        &req.features,
        req.raise_alerts,
        Some(officer.id),
    )?;

    for alert in &risk.alerts {
        publisher::publish_alert_created(&state.rabbitmq, alert).await;
    }

    Ok(Json(ApiResponse::ok(risk)))
}
