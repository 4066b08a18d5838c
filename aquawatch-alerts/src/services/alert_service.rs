use chrono::{DateTime, Utc};
use uuid::Uuid;

use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::models::{Alert, AlertFilter, AlertType, NewAlert, ScopeIds, Severity, StatusChange};
use crate::resolver::{self, ResolutionFailure};
use crate::store::{DirectoryStore, Repository};

/// Fields accepted when raising an alert.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub description: String,
    pub scope: ScopeIds,
    pub source_kind: Option<String>,
    pub source_id: Option<String>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub alert_data: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `ALT` followed by eight upper-case hex digits.
pub fn generate_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ALT{}", hex[..8].to_ascii_uppercase())
}

/// Fill in the levels implied by the most specific one given, rejecting
/// ids that do not exist or do not nest.
pub fn normalize_scope<D>(directory: &D, ids: ScopeIds) -> AppResult<ScopeIds>
where
    D: DirectoryStore + ?Sized,
{
    resolver::derive_scope(directory, ids)
        .map(|scope| scope.ids())
        .map_err(|e| match e {
            ResolutionFailure::UnknownVillage(id) => {
                AppError::new(ErrorCode::VillageNotFound, format!("village {id} not found"))
            }
            ResolutionFailure::UnknownDistrict(id) => {
                AppError::new(ErrorCode::DistrictNotFound, format!("district {id} not found"))
            }
            ResolutionFailure::UnknownState(id) => {
                AppError::new(ErrorCode::StateNotFound, format!("state {id} not found"))
            }
            ResolutionFailure::InconsistentScope(reason) => AppError::with_details(
                ErrorCode::ScopeMismatch,
                reason,
                serde_json::json!({
                    "village_id": ids.village_id,
                    "district_id": ids.district_id,
                    "state_id": ids.state_id,
                }),
            ),
            ResolutionFailure::Store(reason) => AppError::internal(reason),
        })
}

pub fn create_alert<R>(repo: &R, draft: AlertDraft, created_by: Option<Uuid>) -> AppResult<Alert>
where
    R: Repository + ?Sized,
{
    let scope = normalize_scope(repo, draft.scope)?;

    let alert = repo.insert_alert(NewAlert {
        reference: generate_reference(),
        alert_type: draft.alert_type,
        severity: draft.severity,
        title: draft.title,
        message: draft.message,
        description: draft.description,
        village_id: scope.village_id,
        district_id: scope.district_id,
        state_id: scope.state_id,
        source_kind: draft.source_kind,
        source_id: draft.source_id,
        threshold_value: draft.threshold_value,
        actual_value: draft.actual_value,
        alert_data: draft.alert_data,
        created_by,
        expires_at: draft.expires_at,
    })?;

    tracing::info!(
        alert_id = %alert.id,
        reference = %alert.reference,
        alert_type = %alert.alert_type,
        severity = %alert.severity,
        "alert created"
    );
    Ok(alert)
}

pub fn acknowledge<R>(repo: &R, id: Uuid, actor: Uuid) -> AppResult<Alert>
where
    R: Repository + ?Sized,
{
    let alert = repo.transition_status(id, StatusChange::Acknowledge { by: actor, at: Utc::now() })?;
    tracing::info!(alert_id = %id, actor = %actor, "alert acknowledged");
    Ok(alert)
}

pub fn resolve<R>(repo: &R, id: Uuid, actor: Uuid, notes: Option<String>) -> AppResult<Alert>
where
    R: Repository + ?Sized,
{
    let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let alert = repo.transition_status(id, StatusChange::Resolve { by: actor, at: Utc::now(), notes })?;
    tracing::info!(alert_id = %id, actor = %actor, "alert resolved");
    Ok(alert)
}

pub fn get_alert<R>(repo: &R, id: Uuid) -> AppResult<Alert>
where
    R: Repository + ?Sized,
{
    repo.get_alert(id)
}

pub fn list_alerts<R>(repo: &R, filter: &AlertFilter, limit: i64, offset: i64) -> AppResult<(Vec<Alert>, i64)>
where
    R: Repository + ?Sized,
{
    repo.list_alerts(filter, limit, offset)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::AlertStatus;
    use crate::resolver::tests::geography;

    pub(crate) fn draft(alert_type: AlertType, severity: Severity, scope: ScopeIds) -> AlertDraft {
        AlertDraft {
            alert_type,
            severity,
            title: "Cholera cases reported".into(),
            message: "Three confirmed cases this week".into(),
            description: String::new(),
            scope,
            source_kind: None,
            source_id: None,
            threshold_value: None,
            actual_value: None,
            alert_data: serde_json::json!({}),
            expires_at: None,
        }
    }

    #[test]
    fn reference_format() {
        let reference = generate_reference();
        assert_eq!(reference.len(), 11);
        assert!(reference.starts_with("ALT"));
        assert!(reference[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn village_scope_is_filled_in() {
        let store = geography();
        let alert = create_alert(
            &store,
            draft(AlertType::MultipleCases, Severity::High, ScopeIds { village_id: Some(221), ..Default::default() }),
            None,
        )
        .unwrap();
        assert_eq!(alert.village_id, Some(221));
        assert_eq!(alert.district_id, Some(22));
        assert_eq!(alert.state_id, Some(2));
        assert_eq!(alert.status, AlertStatus::Active);
    }

    #[test]
    fn contradicting_scope_is_rejected() {
        let store = geography();
        let scope = ScopeIds { village_id: Some(221), district_id: Some(11), state_id: None };
        let err = create_alert(&store, draft(AlertType::MultipleCases, Severity::High, scope), None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ScopeMismatch));

        let scope = ScopeIds { district_id: Some(77), ..Default::default() };
        let err = create_alert(&store, draft(AlertType::MultipleCases, Severity::High, scope), None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DistrictNotFound));
    }

    #[test]
    fn lifecycle_sets_actor_and_blocks_terminal_moves() {
        let store = geography();
        let alert = create_alert(&store, draft(AlertType::Emergency, Severity::Critical, ScopeIds::default()), None).unwrap();
        let officer = Uuid::new_v4();

        let acked = acknowledge(&store, alert.id, officer).unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by, Some(officer));
        assert!(acked.acknowledged_at.is_some());

        let err = acknowledge(&store, alert.id, officer).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidStatusTransition));

        let resolved = resolve(&store, alert.id, officer, Some("  chlorinated the well ".into())).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolution_notes.as_deref(), Some("chlorinated the well"));
        assert_eq!(resolved.resolved_by, Some(officer));

        let err = resolve(&store, alert.id, officer, None).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidStatusTransition));
    }

    #[test]
    fn unknown_alert_is_not_found() {
        let store = geography();
        let err = acknowledge(&store, Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AlertNotFound));
    }
}
