//! Persistence seams.
//!
//! The dispatcher, resolver and lifecycle service only see these traits, so
//! they run unchanged against Postgres in production and the in-memory
//! store in tests. All methods are synchronous like the diesel calls behind
//! them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aquawatch_shared::AppResult;

use crate::models::{
    Alert, AlertFilter, AlertType, Channel, DeliveryAttempt, DeliveryLog, GeoScope, NewAlert,
    NewSubscription, Recipient, StatusChange, Subscription, Template,
};

pub mod pg;

#[cfg(test)]
pub mod memory;

pub use pg::PgStore;

pub trait AlertStore {
    fn insert_alert(&self, alert: NewAlert) -> AppResult<Alert>;

    fn get_alert(&self, id: Uuid) -> AppResult<Alert>;

    /// Newest first, with the total count for pagination.
    fn list_alerts(&self, filter: &AlertFilter, limit: i64, offset: i64) -> AppResult<(Vec<Alert>, i64)>;

    /// Apply `change` only when the current status allows it. The status,
    /// actor and timestamp are written together or not at all.
    fn transition_status(&self, id: Uuid, change: StatusChange) -> AppResult<Alert>;

    /// Count one fan-out round: `delivery_attempts + 1`, stamp `at`.
    fn record_fanout_round(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

pub trait SubscriptionStore {
    /// Active subscriptions for one category, any scope.
    fn active_subscriptions_for(&self, alert_type: AlertType) -> AppResult<Vec<Subscription>>;

    /// Insert a subscription. An inactive row for the same user, category
    /// and scope is reactivated with the new settings instead; an active one
    /// is a `DuplicateSubscription`.
    fn insert_subscription(&self, subscription: NewSubscription) -> AppResult<Subscription>;

    fn subscriptions_of(&self, user_id: Uuid) -> AppResult<Vec<Subscription>>;

    /// Deactivate a subscription owned by `user_id`.
    fn deactivate_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<Subscription>;
}

pub trait DeliveryLogStore {
    /// Append one row, numbering it after the highest existing attempt for
    /// the same (alert, user, channel).
    fn append_delivery_log(&self, attempt: DeliveryAttempt) -> AppResult<DeliveryLog>;

    fn delivery_logs_for(&self, alert_id: Uuid) -> AppResult<Vec<DeliveryLog>>;
}

pub trait DirectoryStore {
    fn recipient(&self, user_id: Uuid) -> AppResult<Recipient>;

    /// Village with its district and state, via block.
    fn village_scope(&self, village_id: i32) -> AppResult<GeoScope>;

    fn district_scope(&self, district_id: i32) -> AppResult<GeoScope>;

    fn state_scope(&self, state_id: i32) -> AppResult<GeoScope>;
}

pub trait TemplateStore {
    fn active_template(&self, alert_type: AlertType, channel: Channel) -> AppResult<Option<Template>>;
}

/// Everything the alert pipeline needs from storage.
pub trait Repository:
    AlertStore + SubscriptionStore + DeliveryLogStore + DirectoryStore + TemplateStore + Send + Sync
{
    fn ping(&self) -> AppResult<()>;
}
