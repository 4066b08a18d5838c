//! Real-time push to live listeners, grouped by scope or by user.
//!
//! Delivery is best-effort: no persistence, no retry. A group nobody is
//! listening on is skipped silently, and a listener that connects late
//! only sees later messages.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Alert, AlertStatus, AlertType, GeoScope, Severity};

pub mod ws;

/// The four disjoint listener group kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertGroup {
    User(Uuid),
    Village(i32),
    District(i32),
    State(i32),
}

impl fmt::Display for AlertGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertGroup::User(id) => write!(f, "user:{id}"),
            AlertGroup::Village(id) => write!(f, "village:{id}"),
            AlertGroup::District(id) => write!(f, "district:{id}"),
            AlertGroup::State(id) => write!(f, "state:{id}"),
        }
    }
}

/// Public alert fields sent to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub id: Uuid,
    pub reference: String,
    pub alert_type: AlertType,
    pub alert_severity: Severity,
    pub alert_status: AlertStatus,
    pub title: String,
    pub message: String,
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub triggered_at: DateTime<Utc>,
    pub alert_data: serde_json::Value,
}

impl AlertPayload {
    pub fn new(alert: &Alert, scope: &GeoScope) -> Self {
        Self {
            id: alert.id,
            reference: alert.reference.clone(),
            alert_type: alert.alert_type,
            alert_severity: alert.severity,
            alert_status: alert.status,
            title: alert.title.clone(),
            message: alert.message.clone(),
            village: scope.village_name().map(str::to_string),
            district: scope.district_name().map(str::to_string),
            state: scope.state_name().map(str::to_string),
            triggered_at: alert.triggered_at,
            alert_data: alert.alert_data.clone(),
        }
    }
}

/// Wire envelope: `{"type": "new_alert" | "alert_update", "alert": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    NewAlert { alert: AlertPayload },
    AlertUpdate { alert: AlertPayload },
}

impl PushMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::NewAlert { .. } => "new_alert",
            PushMessage::AlertUpdate { .. } => "alert_update",
        }
    }
}

/// Scope groups an alert belongs to, most specific first.
pub fn groups_for(scope: &GeoScope) -> Vec<AlertGroup> {
    let ids = scope.ids();
    [
        ids.village_id.map(AlertGroup::Village),
        ids.district_id.map(AlertGroup::District),
        ids.state_id.map(AlertGroup::State),
    ]
    .into_iter()
    .flatten()
    .collect()
}

type Sender = broadcast::Sender<Arc<PushMessage>>;

/// Listener registry: one broadcast channel per live group.
#[derive(Clone)]
pub struct PushHub {
    groups: Arc<DashMap<AlertGroup, Sender>>,
    capacity: usize,
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, group: AlertGroup) -> broadcast::Receiver<Arc<PushMessage>> {
        self.groups
            .entry(group)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn listener_count(&self, group: AlertGroup) -> usize {
        self.groups.get(&group).map_or(0, |s| s.receiver_count())
    }

    /// Send to one group; returns how many listeners got it.
    pub fn publish(&self, group: AlertGroup, message: Arc<PushMessage>) -> usize {
        let reached = match self.groups.get(&group) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => return 0,
        };
        if reached == 0 {
            // every receiver dropped since the last send
            self.groups.remove_if(&group, |_, s| s.receiver_count() == 0);
        }
        reached
    }

    /// Send `message` to each scope group of the alert plus, when given,
    /// one user's personal group.
    pub fn broadcast(&self, scope: &GeoScope, user: Option<Uuid>, message: PushMessage) -> usize {
        let kind = message.kind();
        let message = Arc::new(message);
        let mut groups = groups_for(scope);
        groups.extend(user.map(AlertGroup::User));

        let mut reached = 0;
        for group in groups {
            let n = self.publish(group, message.clone());
            if n > 0 {
                tracing::debug!(group = %group, listeners = n, kind, "alert pushed");
            }
            reached += n;
        }
        counter!("alert_push_messages_total", "kind" => kind).increment(1);
        reached
    }
}
