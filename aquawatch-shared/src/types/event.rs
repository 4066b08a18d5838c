use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping all domain events.
///
/// Routing key format: `aquawatch.{domain}.{entity}.{action}`
/// Example: `aquawatch.alerts.alert.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const ALERT_CREATED: &str = "aquawatch.alerts.alert.created";
    pub const ALERT_ACKNOWLEDGED: &str = "aquawatch.alerts.alert.acknowledged";
    pub const ALERT_RESOLVED: &str = "aquawatch.alerts.alert.resolved";

    /// Binding pattern matching every alert lifecycle event.
    pub const ALERT_ALL: &str = "aquawatch.alerts.alert.*";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AlertCreated {
        pub alert_id: Uuid,
        pub alert_type: String,
        pub severity: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AlertStatusChanged {
        pub alert_id: Uuid,
        pub status: String,
        pub actor_id: Uuid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_user_and_payload() {
        let alert_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let event = Event::new(
            "aquawatch-alerts",
            routing_keys::ALERT_ACKNOWLEDGED,
            payloads::AlertStatusChanged {
                alert_id,
                status: "ACKNOWLEDGED".into(),
                actor_id: actor,
            },
        )
        .with_user(actor);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], routing_keys::ALERT_ACKNOWLEDGED);
        assert_eq!(json["user_id"], actor.to_string());
        assert_eq!(json["data"]["alert_id"], alert_id.to_string());
        assert!(json["correlation_id"].is_null());
    }
}
