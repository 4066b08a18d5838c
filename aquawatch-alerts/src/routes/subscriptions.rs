use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveTime;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use aquawatch_shared::errors::{AppError, AppResult, ErrorCode};
use aquawatch_shared::types::api::ApiResponse;
use aquawatch_shared::types::auth::AuthUser;

use crate::models::{AlertType, Channel, ScopeIds, Severity, Subscription};
use crate::services::subscription_service::{self, SubscriptionDraft};
use crate::AppState;

fn default_true() -> bool {
    true
}

fn default_min_severity() -> Severity {
    Severity::Low
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    pub alert_type: AlertType,
    pub channels: Vec<Channel>,
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    #[serde(default = "default_true")]
    pub immediate: bool,
    #[serde(default)]
    pub daily_digest: bool,
    #[serde(default)]
    pub weekly_digest: bool,
    #[serde(default)]
    pub monthly_digest: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    #[validate(length(min = 1, max = 50))]
    pub timezone: Option<String>,
}

impl From<CreateSubscriptionRequest> for SubscriptionDraft {
    fn from(req: CreateSubscriptionRequest) -> Self {
        Self {
            alert_type: req.alert_type,
            channels: req.channels,
            scope: ScopeIds {
                village_id: req.village_id,
                district_id: req.district_id,
                state_id: req.state_id,
            },
            min_severity: req.min_severity,
            immediate: req.immediate,
            daily_digest: req.daily_digest,
            weekly_digest: req.weekly_digest,
            monthly_digest: req.monthly_digest,
            quiet_hours_start: req.quiet_hours_start,
            quiet_hours_end: req.quiet_hours_end,
            timezone: req.timezone,
        }
    }
}

/// GET /subscriptions
/// Every subscription of the authenticated user, active or not.
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Subscription>>>> {
    let subscriptions = subscription_service::list_for_user(state.repo.as_ref(), auth_user.id)?;
    Ok(Json(ApiResponse::ok(subscriptions)))
}

/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> AppResult<Json<ApiResponse<Subscription>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let subscription = subscription_service::subscribe(state.repo.as_ref(), auth_user.id, req.into())?;
    Ok(Json(ApiResponse::ok(subscription)))
}

/// DELETE /subscriptions/:id
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Subscription>>> {
    let subscription = subscription_service::unsubscribe(state.repo.as_ref(), auth_user.id, id)?;
    Ok(Json(ApiResponse::ok_with_message(subscription, "subscription deactivated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_immediate_low_threshold() {
        let req: CreateSubscriptionRequest = serde_json::from_value(serde_json::json!({
            "alert_type": "OUTBREAK_PREDICTED",
            "channels": ["EMAIL", "SMS"],
            "district_id": 12,
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let draft = SubscriptionDraft::from(req);
        assert!(draft.immediate);
        assert_eq!(draft.min_severity, Severity::Low);
        assert_eq!(draft.channels, vec![Channel::Email, Channel::Sms]);
        assert_eq!(draft.scope.district_id, Some(12));
    }

    #[test]
    fn unknown_channel_is_rejected_at_parse() {
        let parsed = serde_json::from_value::<CreateSubscriptionRequest>(serde_json::json!({
            "alert_type": "OUTBREAK_PREDICTED",
            "channels": ["PAGER"],
        }));
        assert!(parsed.is_err());
    }
}
