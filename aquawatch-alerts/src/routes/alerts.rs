use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use aquawatch_shared::errors::{AppError, AppResult, ErrorCode};
use aquawatch_shared::middleware::OfficerUser;
use aquawatch_shared::types::api::ApiResponse;
use aquawatch_shared::types::auth::AuthUser;
use aquawatch_shared::types::pagination::{Paginated, PaginationParams};

use crate::dispatcher::DispatchReport;
use crate::events::publisher;
use crate::models::{Alert, AlertFilter, AlertType, DeliveryLog, ScopeIds, Severity};
use crate::services::alert_service::{self, AlertDraft};
use crate::store::DeliveryLogStore;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlertRequest {
    pub alert_type: AlertType,
    pub severity: Severity,
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[serde(default)]
    pub description: String,
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
    #[validate(length(max = 50))]
    pub source_kind: Option<String>,
    #[validate(length(max = 100))]
    pub source_id: Option<String>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    #[serde(default)]
    pub alert_data: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateAlertRequest {
    fn into_draft(self) -> AppResult<AlertDraft> {
        let alert_data = match self.alert_data {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(v @ serde_json::Value::Object(_)) => v,
            Some(_) => {
                return Err(AppError::new(ErrorCode::ValidationError, "alert_data must be a JSON object"))
            }
        };
        Ok(AlertDraft {
            alert_type: self.alert_type,
            severity: self.severity,
            title: self.title,
            message: self.message,
            description: self.description,
            scope: ScopeIds {
                village_id: self.village_id,
                district_id: self.district_id,
                state_id: self.state_id,
            },
            source_kind: self.source_kind,
            source_id: self.source_id,
            threshold_value: self.threshold_value,
            actual_value: self.actual_value,
            alert_data,
            expires_at: self.expires_at,
        })
    }
}

/// POST /alerts
/// Persist the alert; delivery and push happen in the event consumer.
pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    OfficerUser(officer): OfficerUser,
    Json(req): Json<CreateAlertRequest>,
) -> AppResult<Json<ApiResponse<Alert>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let alert = alert_service::create_alert(state.repo.as_ref(), req.into_draft()?, Some(officer.id))?;
    publisher::publish_alert_created(&state.rabbitmq, &alert).await;

    Ok(Json(ApiResponse::ok(alert)))
}

/// GET /alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<AlertFilter>,
) -> AppResult<Json<ApiResponse<Paginated<Alert>>>> {
    let limit = params.limit() as i64;
    let offset = params.offset() as i64;

    let (items, total) = alert_service::list_alerts(state.repo.as_ref(), &filter, limit, offset)?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

/// GET /alerts/:id
pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Alert>>> {
    let alert = alert_service::get_alert(state.repo.as_ref(), id)?;
    Ok(Json(ApiResponse::ok(alert)))
}

/// POST /alerts/:id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    OfficerUser(officer): OfficerUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Alert>>> {
    let alert = alert_service::acknowledge(state.repo.as_ref(), id, officer.id)?;
    publisher::publish_status_changed(&state.rabbitmq, &alert, officer.id).await;

    Ok(Json(ApiResponse::ok(alert)))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ResolveRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// POST /alerts/:id/resolve
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    OfficerUser(officer): OfficerUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveRequest>>,
) -> AppResult<Json<ApiResponse<Alert>>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    req.validate()?;

    let alert = alert_service::resolve(state.repo.as_ref(), id, officer.id, req.notes)?;
    publisher::publish_status_changed(&state.rabbitmq, &alert, officer.id).await;

    Ok(Json(ApiResponse::ok(alert)))
}

/// POST /alerts/:id/dispatch
/// Run another fan-out round right away and return its report.
pub async fn dispatch_alert(
    State(state): State<Arc<AppState>>,
    OfficerUser(officer): OfficerUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DispatchReport>>> {
    let alert = alert_service::get_alert(state.repo.as_ref(), id)?;
    tracing::info!(alert_id = %id, requested_by = %officer.id, "manual dispatch requested");

    let report = state.pipeline.dispatcher().dispatch(&alert).await;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /alerts/:id/deliveries
pub async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    _officer: OfficerUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<DeliveryLog>>>> {
    // 404 for unknown alerts rather than an empty list
    alert_service::get_alert(state.repo.as_ref(), id)?;
    let logs = state.repo.delivery_logs_for(id)?;
    Ok(Json(ApiResponse::ok(logs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(alert_data: serde_json::Value) -> CreateAlertRequest {
        serde_json::from_value(serde_json::json!({
            "alert_type": "WATER_CONTAMINATION",
            "severity": "HIGH",
            "title": "E. coli above limit",
            "message": "Boil water before use",
            "village_id": 111,
            "alert_data": alert_data,
        }))
        .unwrap()
    }

    #[test]
    fn request_parses_wire_names() {
        let req = request(serde_json::json!({"ecoli": 140}));
        assert_eq!(req.alert_type, AlertType::WaterContamination);
        assert_eq!(req.severity, Severity::High);
        assert!(req.validate().is_ok());

        let draft = req.into_draft().unwrap();
        assert_eq!(draft.scope.village_id, Some(111));
        assert_eq!(draft.alert_data["ecoli"], 140);
    }

    #[test]
    fn alert_data_must_be_an_object() {
        assert!(request(serde_json::json!([1, 2])).into_draft().is_err());
        let draft = request(serde_json::Value::Null).into_draft().unwrap();
        assert_eq!(draft.alert_data, serde_json::json!({}));
    }

    #[test]
    fn empty_title_fails_validation() {
        let mut req = request(serde_json::Value::Null);
        req.title = String::new();
        assert!(req.validate().is_err());
    }
}
