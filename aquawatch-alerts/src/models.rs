use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{alert_delivery_logs, alert_subscriptions, alert_templates, alerts, recipients};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Upper-case string enums stored in VARCHAR columns.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.as_str().to_string()
            }
        }
    };
}

text_enum!(
    /// Category of detected condition.
    AlertType, "alert type" {
        OutbreakPredicted => "OUTBREAK_PREDICTED",
        WaterContamination => "WATER_CONTAMINATION",
        MultipleCases => "MULTIPLE_CASES",
        SeasonalHighRisk => "SEASONAL_HIGH_RISK",
        SystemFailure => "SYSTEM_FAILURE",
        EquipmentFailure => "EQUIPMENT_FAILURE",
        DataQuality => "DATA_QUALITY",
        MaintenanceDue => "MAINTENANCE_DUE",
        Emergency => "EMERGENCY",
        Other => "OTHER",
    }
);

text_enum!(
    /// Ordered by declaration: `Low < Medium < High < Critical`.
    Severity, "severity" {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
);

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }
}

text_enum!(
    AlertStatus, "alert status" {
        Active => "ACTIVE",
        Acknowledged => "ACKNOWLEDGED",
        Resolved => "RESOLVED",
        Cancelled => "CANCELLED",
        Escalated => "ESCALATED",
    }
);

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        match self {
            Active => matches!(next, Acknowledged | Resolved | Cancelled | Escalated),
            Acknowledged => matches!(next, Resolved | Cancelled | Escalated),
            Escalated => matches!(next, Acknowledged | Resolved | Cancelled),
            Resolved | Cancelled => false,
        }
    }

    /// Statuses from which `next` is reachable.
    pub fn sources_of(next: AlertStatus) -> Vec<AlertStatus> {
        AlertStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

text_enum!(
    Channel, "channel" {
        Email => "EMAIL",
        Sms => "SMS",
        WhatsApp => "WHATSAPP",
        Push => "PUSH",
        Dashboard => "DASHBOARD",
    }
);

text_enum!(
    DeliveryStatus, "delivery status" {
        Pending => "PENDING",
        Sent => "SENT",
        Delivered => "DELIVERED",
        Failed => "FAILED",
        Bounced => "BOUNCED",
        Unsubscribed => "UNSUBSCRIBED",
    }
);

/// Ordered, duplicate-free channel list stored as `TEXT[]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Channel>", into = "Vec<Channel>")]
pub struct ChannelSet(Vec<Channel>);

impl ChannelSet {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        let mut set = Self::default();
        set.extend(channels);
        set
    }

    pub fn extend(&mut self, channels: impl IntoIterator<Item = Channel>) {
        for c in channels {
            if !self.0.contains(&c) {
                self.0.push(c);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.0.iter()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<Vec<Channel>> for ChannelSet {
    type Error = std::convert::Infallible;

    fn try_from(v: Vec<Channel>) -> Result<Self, Self::Error> {
        Ok(Self::new(v))
    }
}

impl From<ChannelSet> for Vec<Channel> {
    fn from(set: ChannelSet) -> Self {
        set.0
    }
}

impl TryFrom<Vec<String>> for ChannelSet {
    type Error = UnknownVariant;

    fn try_from(v: Vec<String>) -> Result<Self, Self::Error> {
        v.iter()
            .map(|s| s.parse::<Channel>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl From<ChannelSet> for Vec<String> {
    fn from(set: ChannelSet) -> Self {
        set.0.into_iter().map(String::from).collect()
    }
}

/// Channel-specific audit payload kept in `alert_delivery_logs.response`.
///
/// Every key is optional; adapters fill the ones that apply:
/// `address` (email / phone the message went to), `external_id` and
/// `external_status` (provider receipt), `simulated` (no provider call was
/// made), `rendered` (final message text), `listeners` (dashboard sockets
/// reached).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_status: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listeners: Option<usize>,
}

impl DeliveryResponse {
    pub fn simulated(address: Option<String>, rendered: impl Into<String>) -> Self {
        Self {
            address,
            simulated: true,
            rendered: Some(rendered.into()),
            ..Default::default()
        }
    }
}

impl TryFrom<serde_json::Value> for DeliveryResponse {
    type Error = serde_json::Error;

    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        serde_json::from_value(v)
    }
}

impl From<DeliveryResponse> for serde_json::Value {
    fn from(r: DeliveryResponse) -> Self {
        serde_json::to_value(r).unwrap_or_default()
    }
}

// --- alerts ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = alerts)]
pub struct Alert {
    pub id: Uuid,
    pub reference: String,
    #[diesel(deserialize_as = String)]
    pub alert_type: AlertType,
    #[diesel(deserialize_as = String)]
    pub severity: Severity,
    #[diesel(deserialize_as = String)]
    pub status: AlertStatus,
    pub title: String,
    pub message: String,
    pub description: String,
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
    pub source_kind: Option<String>,
    pub source_id: Option<String>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub alert_data: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub delivery_attempts: i32,
    pub last_delivery_attempt: Option<DateTime<Utc>>,
    pub triggered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn scope_ids(&self) -> ScopeIds {
        ScopeIds {
            village_id: self.village_id,
            district_id: self.district_id,
            state_id: self.state_id,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = alerts)]
pub struct NewAlert {
    pub reference: String,
    #[diesel(serialize_as = String)]
    pub alert_type: AlertType,
    #[diesel(serialize_as = String)]
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub description: String,
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
    pub source_kind: Option<String>,
    pub source_id: Option<String>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub alert_data: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Lifecycle mutation applied together with its actor and timestamp.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Acknowledge { by: Uuid, at: DateTime<Utc> },
    Resolve { by: Uuid, at: DateTime<Utc>, notes: Option<String> },
}

impl StatusChange {
    pub fn target(&self) -> AlertStatus {
        match self {
            StatusChange::Acknowledge { .. } => AlertStatus::Acknowledged,
            StatusChange::Resolve { .. } => AlertStatus::Resolved,
        }
    }

    pub fn actor(&self) -> Uuid {
        match self {
            StatusChange::Acknowledge { by, .. } | StatusChange::Resolve { by, .. } => *by,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
}

// --- subscriptions ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = alert_subscriptions)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    #[diesel(deserialize_as = String)]
    pub alert_type: AlertType,
    #[diesel(deserialize_as = Vec<String>)]
    pub channels: ChannelSet,
    pub is_active: bool,
    pub state_id: Option<i32>,
    pub district_id: Option<i32>,
    pub village_id: Option<i32>,
    #[diesel(deserialize_as = String)]
    pub min_severity: Severity,
    pub immediate: bool,
    pub daily_digest: bool,
    pub weekly_digest: bool,
    pub monthly_digest: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = alert_subscriptions)]
pub struct NewSubscription {
    pub user_id: Uuid,
    #[diesel(serialize_as = String)]
    pub alert_type: AlertType,
    #[diesel(serialize_as = Vec<String>)]
    pub channels: ChannelSet,
    pub state_id: Option<i32>,
    pub district_id: Option<i32>,
    pub village_id: Option<i32>,
    #[diesel(serialize_as = String)]
    pub min_severity: Severity,
    pub immediate: bool,
    pub daily_digest: bool,
    pub weekly_digest: bool,
    pub monthly_digest: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub timezone: String,
}

// --- delivery logs ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = alert_delivery_logs)]
pub struct DeliveryLog {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub user_id: Uuid,
    #[diesel(deserialize_as = String)]
    pub channel: Channel,
    pub attempt: i32,
    #[diesel(deserialize_as = String)]
    pub status: DeliveryStatus,
    #[diesel(deserialize_as = serde_json::Value)]
    pub response: DeliveryResponse,
    pub error_message: Option<String>,
    pub external_id: Option<String>,
    pub external_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One attempt's outcome; the store assigns the attempt number.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub alert_id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub response: DeliveryResponse,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = alert_delivery_logs)]
pub struct NewDeliveryLog {
    pub alert_id: Uuid,
    pub user_id: Uuid,
    #[diesel(serialize_as = String)]
    pub channel: Channel,
    pub attempt: i32,
    #[diesel(serialize_as = String)]
    pub status: DeliveryStatus,
    #[diesel(serialize_as = serde_json::Value)]
    pub response: DeliveryResponse,
    pub error_message: Option<String>,
    pub external_id: Option<String>,
    pub external_status: Option<String>,
}

impl NewDeliveryLog {
    pub fn from_attempt(attempt: DeliveryAttempt, number: i32) -> Self {
        Self {
            external_id: attempt.response.external_id.clone(),
            external_status: attempt.response.external_status.clone(),
            alert_id: attempt.alert_id,
            user_id: attempt.user_id,
            channel: attempt.channel,
            attempt: number,
            status: attempt.status,
            response: attempt.response,
            error_message: attempt.error_message,
        }
    }
}

// --- templates ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = alert_templates)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    #[diesel(deserialize_as = String)]
    pub alert_type: AlertType,
    #[diesel(deserialize_as = String)]
    pub channel: Channel,
    pub subject_template: Option<String>,
    pub message_template: String,
    pub max_length: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- directory ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = recipients)]
pub struct Recipient {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: i32,
    pub name: String,
}

/// Raw scope identifiers as stored on an alert or subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeIds {
    pub village_id: Option<i32>,
    pub district_id: Option<i32>,
    pub state_id: Option<i32>,
}

/// Fully named scope, derived through the geography hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeoScope {
    pub village: Option<Place>,
    pub district: Option<Place>,
    pub state: Option<Place>,
}

impl GeoScope {
    pub fn ids(&self) -> ScopeIds {
        ScopeIds {
            village_id: self.village.as_ref().map(|p| p.id),
            district_id: self.district.as_ref().map(|p| p.id),
            state_id: self.state.as_ref().map(|p| p.id),
        }
    }

    pub fn village_name(&self) -> Option<&str> {
        self.village.as_ref().map(|p| p.name.as_str())
    }

    pub fn district_name(&self) -> Option<&str> {
        self.district.as_ref().map(|p| p.name.as_str())
    }

    pub fn state_name(&self) -> Option<&str> {
        self.state.as_ref().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_rank_not_text() {
        // "CRITICAL" < "HIGH" < "LOW" < "MEDIUM" alphabetically
        let mut all = vec![Severity::Critical, Severity::Low, Severity::High, Severity::Medium];
        all.sort();
        assert_eq!(all, vec![Severity::Low, Severity::Medium, Severity::High, Severity::Critical]);
        assert!(Severity::Medium <= Severity::High);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("water_contamination".parse::<AlertType>().unwrap(), AlertType::WaterContamination);
        assert_eq!("WhatsApp".parse::<Channel>().unwrap(), Channel::WhatsApp);
        let err = "urgent".parse::<Severity>().unwrap_err();
        assert_eq!(err.kind, "severity");
    }

    #[test]
    fn terminal_statuses_never_move() {
        for status in AlertStatus::ALL {
            if status.is_terminal() {
                assert!(AlertStatus::ALL.iter().all(|n| !status.can_transition_to(*n)));
            }
        }
        assert!(AlertStatus::Escalated.can_transition_to(AlertStatus::Acknowledged));
        assert!(!AlertStatus::Acknowledged.can_transition_to(AlertStatus::Acknowledged));
        assert_eq!(
            AlertStatus::sources_of(AlertStatus::Acknowledged),
            vec![AlertStatus::Active, AlertStatus::Escalated]
        );
    }

    #[test]
    fn channel_set_keeps_first_occurrence_order() {
        let mut set = ChannelSet::new([Channel::Sms, Channel::Email, Channel::Sms]);
        set.extend([Channel::Dashboard, Channel::Email]);
        let order: Vec<_> = set.iter().copied().collect();
        assert_eq!(order, vec![Channel::Sms, Channel::Email, Channel::Dashboard]);

        let stored: Vec<String> = set.into();
        assert_eq!(stored, vec!["SMS", "EMAIL", "DASHBOARD"]);
        assert!(ChannelSet::try_from(vec!["FAX".to_string()]).is_err());
    }

    #[test]
    fn delivery_response_omits_unset_keys() {
        let json: serde_json::Value =
            DeliveryResponse::simulated(Some("+911234567890".into()), "hello").into();
        assert_eq!(
            json,
            serde_json::json!({ "address": "+911234567890", "simulated": true, "rendered": "hello" })
        );
        let back = DeliveryResponse::try_from(serde_json::json!({ "external_id": "SM1" })).unwrap();
        assert_eq!(back.external_id.as_deref(), Some("SM1"));
        assert!(!back.simulated);
    }
}
