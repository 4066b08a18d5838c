//! Subscriber resolution: which users should hear about an alert.

use uuid::Uuid;

use aquawatch_shared::{AppError, ErrorCode};

use crate::models::{Alert, ChannelSet, GeoScope, ScopeIds, Subscription};
use crate::store::{DirectoryStore, SubscriptionStore};

/// Subscriber set could not be computed. Reported to the caller as a
/// failed dispatch; never raised past the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("village {0} is not in the geography directory")]
    UnknownVillage(i32),

    #[error("district {0} is not in the geography directory")]
    UnknownDistrict(i32),

    #[error("state {0} is not in the geography directory")]
    UnknownState(i32),

    #[error("alert scope is inconsistent: {0}")]
    InconsistentScope(String),

    #[error("lookup failed: {0}")]
    Store(String),
}

impl ResolutionFailure {
    fn from_lookup(err: AppError, ids: ScopeIds) -> Self {
        match err.code() {
            Some(ErrorCode::VillageNotFound) => Self::UnknownVillage(ids.village_id.unwrap_or_default()),
            Some(ErrorCode::DistrictNotFound) => Self::UnknownDistrict(ids.district_id.unwrap_or_default()),
            Some(ErrorCode::StateNotFound) => Self::UnknownState(ids.state_id.unwrap_or_default()),
            _ => Self::Store(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubscriber {
    pub user_id: Uuid,
    /// Union of the channels of every matching subscription, first seen first.
    pub channels: ChannelSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    NoSubscribers,
    Subscribers(Vec<ResolvedSubscriber>),
}

/// Expand an alert's stored scope through the hierarchy (village → district
/// → state). Stored levels above the most specific one must agree with the
/// derived ones.
pub fn derive_scope<D>(directory: &D, ids: ScopeIds) -> Result<GeoScope, ResolutionFailure>
where
    D: DirectoryStore + ?Sized,
{
    let lookup = match (ids.village_id, ids.district_id, ids.state_id) {
        (Some(village_id), _, _) => directory.village_scope(village_id),
        (None, Some(district_id), _) => directory.district_scope(district_id),
        (None, None, Some(state_id)) => directory.state_scope(state_id),
        (None, None, None) => return Ok(GeoScope::default()),
    };
    let scope = lookup.map_err(|e| ResolutionFailure::from_lookup(e, ids))?;

    let derived = scope.ids();
    if ids.district_id.is_some() && ids.district_id != derived.district_id {
        return Err(ResolutionFailure::InconsistentScope(format!(
            "district {:?} does not contain the alert's village",
            ids.district_id
        )));
    }
    if ids.state_id.is_some() && ids.state_id != derived.state_id {
        return Err(ResolutionFailure::InconsistentScope(format!(
            "state {:?} does not contain the alert's district",
            ids.state_id
        )));
    }
    Ok(scope)
}

/// Narrowest level set on the subscription decides.
pub fn scope_matches(subscription: ScopeIds, alert: ScopeIds) -> bool {
    if let Some(village) = subscription.village_id {
        alert.village_id == Some(village)
    } else if let Some(district) = subscription.district_id {
        alert.district_id == Some(district)
    } else if let Some(state) = subscription.state_id {
        alert.state_id == Some(state)
    } else {
        true
    }
}

pub fn subscription_matches(sub: &Subscription, alert: &Alert, alert_scope: ScopeIds) -> bool {
    let sub_scope = ScopeIds {
        village_id: sub.village_id,
        district_id: sub.district_id,
        state_id: sub.state_id,
    };
    sub.is_active
        && sub.alert_type == alert.alert_type
        && sub.min_severity <= alert.severity
        && scope_matches(sub_scope, alert_scope)
}

/// Users to notify immediately about `alert`, one entry per user.
pub fn resolve<S>(store: &S, alert: &Alert, scope: &GeoScope) -> Result<Resolution, ResolutionFailure>
where
    S: SubscriptionStore + ?Sized,
{
    let candidates = store
        .active_subscriptions_for(alert.alert_type)
        .map_err(|e| ResolutionFailure::Store(e.to_string()))?;

    let alert_scope = scope.ids();
    let mut resolved: Vec<ResolvedSubscriber> = Vec::new();
    for sub in candidates
        .iter()
        .filter(|s| s.immediate && subscription_matches(s, alert, alert_scope))
    {
        match resolved.iter_mut().find(|r| r.user_id == sub.user_id) {
            Some(existing) => existing.channels.extend(sub.channels.iter().copied()),
            None => resolved.push(ResolvedSubscriber {
                user_id: sub.user_id,
                channels: sub.channels.clone(),
            }),
        }
    }

    tracing::debug!(
        alert_id = %alert.id,
        candidates = candidates.len(),
        resolved = resolved.len(),
        "subscribers resolved"
    );

    if resolved.is_empty() {
        Ok(Resolution::NoSubscribers)
    } else {
        Ok(Resolution::Subscribers(resolved))
    }
}
