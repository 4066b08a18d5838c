use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aquawatch_shared::{AppError, AppResult, ErrorCode};

use crate::models::{
    Alert, AlertFilter, AlertStatus, AlertType, Channel, DeliveryAttempt, DeliveryLog, GeoScope,
    NewAlert, NewDeliveryLog, NewSubscription, Place, Recipient, StatusChange, Subscription,
    Template,
};
use crate::store::{
    AlertStore, DeliveryLogStore, DirectoryStore, Repository, SubscriptionStore, TemplateStore,
};

#[derive(Default)]
struct Tables {
    alerts: Vec<Alert>,
    subscriptions: Vec<Subscription>,
    logs: Vec<DeliveryLog>,
    templates: Vec<Template>,
    recipients: HashMap<Uuid, Recipient>,
    villages: HashMap<i32, (String, i32)>,
    districts: HashMap<i32, (String, i32)>,
    states: HashMap<i32, String>,
}

/// Test double for every store trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_state(&self, id: i32, name: &str) {
        self.tables().states.insert(id, name.to_string());
    }

    pub fn add_district(&self, id: i32, name: &str, state_id: i32) {
        self.tables().districts.insert(id, (name.to_string(), state_id));
    }

    pub fn add_village(&self, id: i32, name: &str, district_id: i32) {
        self.tables().villages.insert(id, (name.to_string(), district_id));
    }

    /// Recipient with both an email address and a phone number.
    pub fn add_recipient(&self, id: Uuid) -> Recipient {
        let short = &id.simple().to_string()[..8];
        let recipient = Recipient {
            id,
            username: format!("user-{short}"),
            email: Some(format!("{short}@example.org")),
            phone_number: Some("+919800000000".into()),
            is_active: true,
        };
        self.tables().recipients.insert(id, recipient.clone());
        recipient
    }

    pub fn put_recipient(&self, recipient: Recipient) {
        self.tables().recipients.insert(recipient.id, recipient);
    }

    pub fn add_template(&self, template: Template) {
        self.tables().templates.push(template);
    }

    pub fn alert(&self, id: Uuid) -> Alert {
        self.get_alert(id).unwrap()
    }

    pub fn log_count(&self) -> usize {
        self.tables().logs.len()
    }
}

fn alert_matches(alert: &Alert, filter: &AlertFilter) -> bool {
    filter.status.map_or(true, |s| alert.status == s)
        && filter.alert_type.map_or(true, |t| alert.alert_type == t)
        && filter.village_id.map_or(true, |v| alert.village_id == Some(v))
        && filter.district_id.map_or(true, |d| alert.district_id == Some(d))
        && filter.state_id.map_or(true, |s| alert.state_id == Some(s))
}

impl AlertStore for MemoryStore {
    fn insert_alert(&self, new: NewAlert) -> AppResult<Alert> {
        let now = Utc::now();
        let alert = Alert {
            id: Uuid::new_v4(),
            reference: new.reference,
            alert_type: new.alert_type,
            severity: new.severity,
            status: AlertStatus::Active,
            title: new.title,
            message: new.message,
            description: new.description,
            village_id: new.village_id,
            district_id: new.district_id,
            state_id: new.state_id,
            source_kind: new.source_kind,
            source_id: new.source_id,
            threshold_value: new.threshold_value,
            actual_value: new.actual_value,
            alert_data: new.alert_data,
            created_by: new.created_by,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            expires_at: new.expires_at,
            delivery_attempts: 0,
            last_delivery_attempt: None,
            triggered_at: now,
            updated_at: now,
        };
        self.tables().alerts.push(alert.clone());
        Ok(alert)
    }

    fn get_alert(&self, id: Uuid) -> AppResult<Alert> {
        self.tables()
            .alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::AlertNotFound, "alert not found"))
    }

    fn list_alerts(&self, filter: &AlertFilter, limit: i64, offset: i64) -> AppResult<(Vec<Alert>, i64)> {
        let tables = self.tables();
        let mut matching: Vec<Alert> = tables
            .alerts
            .iter()
            .filter(|a| alert_matches(a, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    fn transition_status(&self, id: Uuid, change: StatusChange) -> AppResult<Alert> {
        let mut tables = self.tables();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::new(ErrorCode::AlertNotFound, "alert not found"))?;

        let target = change.target();
        if !alert.status.can_transition_to(target) {
            return Err(AppError::new(
                ErrorCode::InvalidStatusTransition,
                format!("cannot move alert from {} to {target}", alert.status),
            ));
        }

        alert.status = target;
        match change {
            StatusChange::Acknowledge { by, at } => {
                alert.acknowledged_by = Some(by);
                alert.acknowledged_at = Some(at);
                alert.updated_at = at;
            }
            StatusChange::Resolve { by, at, notes } => {
                alert.resolved_by = Some(by);
                alert.resolved_at = Some(at);
                alert.resolution_notes = notes;
                alert.updated_at = at;
            }
        }
        Ok(alert.clone())
    }

    fn record_fanout_round(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut tables = self.tables();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::new(ErrorCode::AlertNotFound, "alert not found"))?;
        alert.delivery_attempts += 1;
        alert.last_delivery_attempt = Some(at);
        Ok(())
    }
}

impl SubscriptionStore for MemoryStore {
    fn active_subscriptions_for(&self, alert_type: AlertType) -> AppResult<Vec<Subscription>> {
        Ok(self
            .tables()
            .subscriptions
            .iter()
            .filter(|s| s.is_active && s.alert_type == alert_type)
            .cloned()
            .collect())
    }

    fn insert_subscription(&self, new: NewSubscription) -> AppResult<Subscription> {
        let mut tables = self.tables();
        let now = Utc::now();
        let existing = tables.subscriptions.iter_mut().find(|s| {
            s.user_id == new.user_id
                && s.alert_type == new.alert_type
                && s.state_id == new.state_id
                && s.district_id == new.district_id
                && s.village_id == new.village_id
        });
        if let Some(sub) = existing {
            if sub.is_active {
                return Err(AppError::new(ErrorCode::DuplicateSubscription, "duplicate subscription"));
            }
            sub.is_active = true;
            sub.channels = new.channels;
            sub.min_severity = new.min_severity;
            sub.immediate = new.immediate;
            sub.daily_digest = new.daily_digest;
            sub.weekly_digest = new.weekly_digest;
            sub.monthly_digest = new.monthly_digest;
            sub.quiet_hours_start = new.quiet_hours_start;
            sub.quiet_hours_end = new.quiet_hours_end;
            sub.timezone = new.timezone;
            sub.updated_at = now;
            return Ok(sub.clone());
        }

        let sub = Subscription {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            alert_type: new.alert_type,
            channels: new.channels,
            is_active: true,
            state_id: new.state_id,
            district_id: new.district_id,
            village_id: new.village_id,
            min_severity: new.min_severity,
            immediate: new.immediate,
            daily_digest: new.daily_digest,
            weekly_digest: new.weekly_digest,
            monthly_digest: new.monthly_digest,
            quiet_hours_start: new.quiet_hours_start,
            quiet_hours_end: new.quiet_hours_end,
            timezone: new.timezone,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.push(sub.clone());
        Ok(sub)
    }

    fn subscriptions_of(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        Ok(self
            .tables()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn deactivate_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<Subscription> {
        let mut tables = self.tables();
        let sub = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
            .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound, "subscription not found"))?;
        sub.is_active = false;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }
}

impl DeliveryLogStore for MemoryStore {
    fn append_delivery_log(&self, attempt: DeliveryAttempt) -> AppResult<DeliveryLog> {
        let mut tables = self.tables();
        let current = tables
            .logs
            .iter()
            .filter(|l| {
                l.alert_id == attempt.alert_id
                    && l.user_id == attempt.user_id
                    && l.channel == attempt.channel
            })
            .map(|l| l.attempt)
            .max()
            .unwrap_or(0);

        let row = NewDeliveryLog::from_attempt(attempt, current + 1);
        let log = DeliveryLog {
            id: Uuid::new_v4(),
            alert_id: row.alert_id,
            user_id: row.user_id,
            channel: row.channel,
            attempt: row.attempt,
            status: row.status,
            response: row.response,
            error_message: row.error_message,
            external_id: row.external_id,
            external_status: row.external_status,
            created_at: Utc::now(),
        };
        tables.logs.push(log.clone());
        Ok(log)
    }

    fn delivery_logs_for(&self, alert_id: Uuid) -> AppResult<Vec<DeliveryLog>> {
        Ok(self
            .tables()
            .logs
            .iter()
            .filter(|l| l.alert_id == alert_id)
            .cloned()
            .collect())
    }
}

impl DirectoryStore for MemoryStore {
    fn recipient(&self, user_id: Uuid) -> AppResult<Recipient> {
        self.tables()
            .recipients
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::RecipientNotFound, "recipient not found"))
    }

    fn village_scope(&self, village_id: i32) -> AppResult<GeoScope> {
        let (name, district_id) = self
            .tables()
            .villages
            .get(&village_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::VillageNotFound, "village not found"))?;
        let mut scope = self.district_scope(district_id)?;
        scope.village = Some(Place { id: village_id, name });
        Ok(scope)
    }

    fn district_scope(&self, district_id: i32) -> AppResult<GeoScope> {
        let (name, state_id) = self
            .tables()
            .districts
            .get(&district_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::DistrictNotFound, "district not found"))?;
        let mut scope = self.state_scope(state_id)?;
        scope.district = Some(Place { id: district_id, name });
        Ok(scope)
    }

    fn state_scope(&self, state_id: i32) -> AppResult<GeoScope> {
        let name = self
            .tables()
            .states
            .get(&state_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::StateNotFound, "state not found"))?;
        Ok(GeoScope {
            state: Some(Place { id: state_id, name }),
            ..Default::default()
        })
    }
}

impl TemplateStore for MemoryStore {
    fn active_template(&self, alert_type: AlertType, channel: Channel) -> AppResult<Option<Template>> {
        Ok(self
            .tables()
            .templates
            .iter()
            .find(|t| t.is_active && t.alert_type == alert_type && t.channel == channel)
            .cloned())
    }
}

impl Repository for MemoryStore {
    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
