use chrono::NaiveTime;
use uuid::Uuid;

use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::models::{AlertType, Channel, ChannelSet, NewSubscription, ScopeIds, Severity, Subscription};
use crate::services::alert_service::normalize_scope;
use crate::store::Repository;

const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

#[derive(Debug, Clone)]
pub struct SubscriptionDraft {
    pub alert_type: AlertType,
    pub channels: Vec<Channel>,
    pub scope: ScopeIds,
    pub min_severity: Severity,
    pub immediate: bool,
    pub daily_digest: bool,
    pub weekly_digest: bool,
    pub monthly_digest: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub timezone: Option<String>,
}

/// Register `user_id` for one alert category. The scope is validated but
/// stored exactly as given: a district-only subscription stays district-wide.
pub fn subscribe<R>(repo: &R, user_id: Uuid, draft: SubscriptionDraft) -> AppResult<Subscription>
where
    R: Repository + ?Sized,
{
    let channels = ChannelSet::new(draft.channels);
    if channels.is_empty() {
        return Err(AppError::new(ErrorCode::NoChannelsSelected, "select at least one channel"));
    }
    if draft.quiet_hours_start.is_some() != draft.quiet_hours_end.is_some() {
        return Err(AppError::bad_request("quiet hours need both a start and an end"));
    }
    normalize_scope(repo, draft.scope)?;

    let subscription = repo.insert_subscription(NewSubscription {
        user_id,
        alert_type: draft.alert_type,
        channels,
        state_id: draft.scope.state_id,
        district_id: draft.scope.district_id,
        village_id: draft.scope.village_id,
        min_severity: draft.min_severity,
        immediate: draft.immediate,
        daily_digest: draft.daily_digest,
        weekly_digest: draft.weekly_digest,
        monthly_digest: draft.monthly_digest,
        quiet_hours_start: draft.quiet_hours_start,
        quiet_hours_end: draft.quiet_hours_end,
        timezone: draft.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
    })?;

    tracing::info!(
        subscription_id = %subscription.id,
        user_id = %user_id,
        alert_type = %subscription.alert_type,
        "subscription created"
    );
    Ok(subscription)
}

pub fn list_for_user<R>(repo: &R, user_id: Uuid) -> AppResult<Vec<Subscription>>
where
    R: Repository + ?Sized,
{
    repo.subscriptions_of(user_id)
}

pub fn unsubscribe<R>(repo: &R, user_id: Uuid, subscription_id: Uuid) -> AppResult<Subscription>
where
    R: Repository + ?Sized,
{
    let subscription = repo.deactivate_subscription(subscription_id, user_id)?;
    tracing::info!(subscription_id = %subscription_id, user_id = %user_id, "subscription deactivated");
    Ok(subscription)
}
