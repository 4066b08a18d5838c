use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use aquawatch_shared::clients::db::{checkout, DbPool};
use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::models::{
    Alert, AlertFilter, AlertStatus, AlertType, Channel, DeliveryAttempt, DeliveryLog, GeoScope,
    NewAlert, NewDeliveryLog, NewSubscription, Place, Recipient, StatusChange, Subscription,
    Template,
};
use crate::schema::{
    alert_delivery_logs, alert_subscriptions, alert_templates, alerts, blocks, districts,
    recipients, states, villages,
};
use crate::store::{
    AlertStore, DeliveryLogStore, DirectoryStore, Repository, SubscriptionStore, TemplateStore,
};

/// Concurrent appends can race for the same attempt number; the unique
/// index rejects the loser, which re-reads and tries again.
const APPEND_RETRIES: usize = 3;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn alert_not_found(id: Uuid) -> AppError {
    AppError::new(ErrorCode::AlertNotFound, format!("alert {id} not found"))
}

fn duplicate_subscription() -> AppError {
    AppError::new(
        ErrorCode::DuplicateSubscription,
        "a subscription for this category and scope already exists",
    )
}

fn filtered_alerts(filter: &AlertFilter) -> alerts::BoxedQuery<'static, Pg> {
    let mut query = alerts::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(alerts::status.eq(status.as_str()));
    }
    if let Some(alert_type) = filter.alert_type {
        query = query.filter(alerts::alert_type.eq(alert_type.as_str()));
    }
    if let Some(village_id) = filter.village_id {
        query = query.filter(alerts::village_id.eq(village_id));
    }
    if let Some(district_id) = filter.district_id {
        query = query.filter(alerts::district_id.eq(district_id));
    }
    if let Some(state_id) = filter.state_id {
        query = query.filter(alerts::state_id.eq(state_id));
    }
    query
}

impl AlertStore for PgStore {
    fn insert_alert(&self, alert: NewAlert) -> AppResult<Alert> {
        let mut conn = checkout(&self.pool)?;
        let alert = diesel::insert_into(alerts::table)
            .values(alert)
            .get_result::<Alert>(&mut conn)?;
        Ok(alert)
    }

    fn get_alert(&self, id: Uuid) -> AppResult<Alert> {
        let mut conn = checkout(&self.pool)?;
        alerts::table
            .find(id)
            .first::<Alert>(&mut conn)
            .optional()?
            .ok_or_else(|| alert_not_found(id))
    }

    fn list_alerts(&self, filter: &AlertFilter, limit: i64, offset: i64) -> AppResult<(Vec<Alert>, i64)> {
        let mut conn = checkout(&self.pool)?;

        let total: i64 = filtered_alerts(filter).count().get_result(&mut conn)?;
        let items = filtered_alerts(filter)
            .order(alerts::triggered_at.desc())
            .limit(limit)
            .offset(offset)
            .load::<Alert>(&mut conn)?;

        Ok((items, total))
    }

    fn transition_status(&self, id: Uuid, change: StatusChange) -> AppResult<Alert> {
        let mut conn = checkout(&self.pool)?;
        let target = change.target();
        let sources: Vec<&'static str> = AlertStatus::sources_of(target)
            .iter()
            .map(|s| s.as_str())
            .collect();

        let eligible = alerts::table
            .filter(alerts::id.eq(id))
            .filter(alerts::status.eq_any(sources));

        let updated = match change {
            StatusChange::Acknowledge { by, at } => diesel::update(eligible)
                .set((
                    alerts::status.eq(target.as_str()),
                    alerts::acknowledged_by.eq(Some(by)),
                    alerts::acknowledged_at.eq(Some(at)),
                    alerts::updated_at.eq(at),
                ))
                .get_result::<Alert>(&mut conn)
                .optional()?,
            StatusChange::Resolve { by, at, notes } => diesel::update(eligible)
                .set((
                    alerts::status.eq(target.as_str()),
                    alerts::resolved_by.eq(Some(by)),
                    alerts::resolved_at.eq(Some(at)),
                    alerts::resolution_notes.eq(notes),
                    alerts::updated_at.eq(at),
                ))
                .get_result::<Alert>(&mut conn)
                .optional()?,
        };

        if let Some(alert) = updated {
            return Ok(alert);
        }

        // Nothing matched: either the alert is missing or its status forbids the move.
        let current: Option<String> = alerts::table
            .find(id)
            .select(alerts::status)
            .first(&mut conn)
            .optional()?;
        match current {
            None => Err(alert_not_found(id)),
            Some(status) => Err(AppError::with_details(
                ErrorCode::InvalidStatusTransition,
                format!("cannot move alert from {status} to {target}"),
                serde_json::json!({ "from": status, "to": target.as_str() }),
            )),
        }
    }

    fn record_fanout_round(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut conn = checkout(&self.pool)?;
        let updated = diesel::update(alerts::table.find(id))
            .set((
                alerts::delivery_attempts.eq(alerts::delivery_attempts + 1),
                alerts::last_delivery_attempt.eq(Some(at)),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            return Err(alert_not_found(id));
        }
        Ok(())
    }
}

impl SubscriptionStore for PgStore {
    fn active_subscriptions_for(&self, alert_type: AlertType) -> AppResult<Vec<Subscription>> {
        let mut conn = checkout(&self.pool)?;
        let subs = alert_subscriptions::table
            .filter(alert_subscriptions::alert_type.eq(alert_type.as_str()))
            .filter(alert_subscriptions::is_active.eq(true))
            .order(alert_subscriptions::created_at.asc())
            .load::<Subscription>(&mut conn)?;
        Ok(subs)
    }

    fn insert_subscription(&self, subscription: NewSubscription) -> AppResult<Subscription> {
        let mut conn = checkout(&self.pool)?;
        conn.transaction::<Subscription, AppError, _>(|conn| {
            // the unique index is on COALESCEd scope columns, so match NULLs as equal
            let existing: Option<(Uuid, bool)> = alert_subscriptions::table
                .filter(alert_subscriptions::user_id.eq(subscription.user_id))
                .filter(alert_subscriptions::alert_type.eq(subscription.alert_type.as_str()))
                .filter(alert_subscriptions::state_id.is_not_distinct_from(subscription.state_id))
                .filter(alert_subscriptions::district_id.is_not_distinct_from(subscription.district_id))
                .filter(alert_subscriptions::village_id.is_not_distinct_from(subscription.village_id))
                .select((alert_subscriptions::id, alert_subscriptions::is_active))
                .for_update()
                .first(conn)
                .optional()?;

            match existing {
                Some((_, true)) => Err(duplicate_subscription()),
                Some((id, false)) => {
                    let sub = diesel::update(alert_subscriptions::table.find(id))
                        .set((
                            alert_subscriptions::is_active.eq(true),
                            alert_subscriptions::channels.eq(Vec::<String>::from(subscription.channels)),
                            alert_subscriptions::min_severity.eq(subscription.min_severity.as_str()),
                            alert_subscriptions::immediate.eq(subscription.immediate),
                            alert_subscriptions::daily_digest.eq(subscription.daily_digest),
                            alert_subscriptions::weekly_digest.eq(subscription.weekly_digest),
                            alert_subscriptions::monthly_digest.eq(subscription.monthly_digest),
                            alert_subscriptions::quiet_hours_start.eq(subscription.quiet_hours_start),
                            alert_subscriptions::quiet_hours_end.eq(subscription.quiet_hours_end),
                            alert_subscriptions::timezone.eq(subscription.timezone),
                            alert_subscriptions::updated_at.eq(Utc::now()),
                        ))
                        .get_result::<Subscription>(conn)?;
                    tracing::debug!(subscription_id = %id, "inactive subscription reactivated");
                    Ok(sub)
                }
                None => diesel::insert_into(alert_subscriptions::table)
                    .values(subscription)
                    .get_result::<Subscription>(conn)
                    .map_err(|e| match e {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            duplicate_subscription()
                        }
                        other => AppError::Database(other),
                    }),
            }
        })
    }

    fn subscriptions_of(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let mut conn = checkout(&self.pool)?;
        let subs = alert_subscriptions::table
            .filter(alert_subscriptions::user_id.eq(user_id))
            .order(alert_subscriptions::created_at.desc())
            .load::<Subscription>(&mut conn)?;
        Ok(subs)
    }

    fn deactivate_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<Subscription> {
        let mut conn = checkout(&self.pool)?;
        diesel::update(
            alert_subscriptions::table
                .filter(alert_subscriptions::id.eq(id))
                .filter(alert_subscriptions::user_id.eq(user_id)),
        )
        .set((
            alert_subscriptions::is_active.eq(false),
            alert_subscriptions::updated_at.eq(Utc::now()),
        ))
        .get_result::<Subscription>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound, "subscription not found"))
    }
}

impl DeliveryLogStore for PgStore {
    fn append_delivery_log(&self, attempt: DeliveryAttempt) -> AppResult<DeliveryLog> {
        let mut conn = checkout(&self.pool)?;

        for _ in 0..APPEND_RETRIES {
            let result = conn.transaction::<DeliveryLog, DieselError, _>(|conn| {
                let current: Option<i32> = alert_delivery_logs::table
                    .filter(alert_delivery_logs::alert_id.eq(attempt.alert_id))
                    .filter(alert_delivery_logs::user_id.eq(attempt.user_id))
                    .filter(alert_delivery_logs::channel.eq(attempt.channel.as_str()))
                    .select(diesel::dsl::max(alert_delivery_logs::attempt))
                    .first(conn)?;

                let row = NewDeliveryLog::from_attempt(attempt.clone(), current.unwrap_or(0) + 1);
                diesel::insert_into(alert_delivery_logs::table)
                    .values(row)
                    .get_result::<DeliveryLog>(conn)
            });

            match result {
                Ok(log) => return Ok(log),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    tracing::debug!(
                        alert_id = %attempt.alert_id,
                        channel = %attempt.channel,
                        "attempt number taken, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::internal("could not allocate a delivery attempt number"))
    }

    fn delivery_logs_for(&self, alert_id: Uuid) -> AppResult<Vec<DeliveryLog>> {
        let mut conn = checkout(&self.pool)?;
        let logs = alert_delivery_logs::table
            .filter(alert_delivery_logs::alert_id.eq(alert_id))
            .order((
                alert_delivery_logs::user_id.asc(),
                alert_delivery_logs::channel.asc(),
                alert_delivery_logs::attempt.asc(),
            ))
            .load::<DeliveryLog>(&mut conn)?;
        Ok(logs)
    }
}

impl DirectoryStore for PgStore {
    fn recipient(&self, user_id: Uuid) -> AppResult<Recipient> {
        let mut conn = checkout(&self.pool)?;
        recipients::table
            .find(user_id)
            .first::<Recipient>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::RecipientNotFound, format!("recipient {user_id} not found")))
    }

    fn village_scope(&self, village_id: i32) -> AppResult<GeoScope> {
        let mut conn = checkout(&self.pool)?;
        let row = villages::table
            .inner_join(blocks::table.inner_join(districts::table.inner_join(states::table)))
            .filter(villages::id.eq(village_id))
            .select((
                villages::id,
                villages::name,
                districts::id,
                districts::name,
                states::id,
                states::name,
            ))
            .first::<(i32, String, i32, String, i32, String)>(&mut conn)
            .optional()?;

        let (vid, vname, did, dname, sid, sname) = row.ok_or_else(|| {
            AppError::new(ErrorCode::VillageNotFound, format!("village {village_id} not found"))
        })?;
        Ok(GeoScope {
            village: Some(Place { id: vid, name: vname }),
            district: Some(Place { id: did, name: dname }),
            state: Some(Place { id: sid, name: sname }),
        })
    }

    fn district_scope(&self, district_id: i32) -> AppResult<GeoScope> {
        let mut conn = checkout(&self.pool)?;
        let row = districts::table
            .inner_join(states::table)
            .filter(districts::id.eq(district_id))
            .select((districts::id, districts::name, states::id, states::name))
            .first::<(i32, String, i32, String)>(&mut conn)
            .optional()?;

        let (did, dname, sid, sname) = row.ok_or_else(|| {
            AppError::new(ErrorCode::DistrictNotFound, format!("district {district_id} not found"))
        })?;
        Ok(GeoScope {
            village: None,
            district: Some(Place { id: did, name: dname }),
            state: Some(Place { id: sid, name: sname }),
        })
    }

    fn state_scope(&self, state_id: i32) -> AppResult<GeoScope> {
        let mut conn = checkout(&self.pool)?;
        let row = states::table
            .find(state_id)
            .select((states::id, states::name))
            .first::<(i32, String)>(&mut conn)
            .optional()?;

        let (sid, sname) = row.ok_or_else(|| {
            AppError::new(ErrorCode::StateNotFound, format!("state {state_id} not found"))
        })?;
        Ok(GeoScope {
            village: None,
            district: None,
            state: Some(Place { id: sid, name: sname }),
        })
    }
}

impl TemplateStore for PgStore {
    fn active_template(&self, alert_type: AlertType, channel: Channel) -> AppResult<Option<Template>> {
        let mut conn = checkout(&self.pool)?;
        let template = alert_templates::table
            .filter(alert_templates::alert_type.eq(alert_type.as_str()))
            .filter(alert_templates::channel.eq(channel.as_str()))
            .filter(alert_templates::is_active.eq(true))
            .first::<Template>(&mut conn)
            .optional()?;
        Ok(template)
    }
}

impl Repository for PgStore {
    fn ping(&self) -> AppResult<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}
