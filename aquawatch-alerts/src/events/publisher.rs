use uuid::Uuid;

use aquawatch_shared::clients::rabbitmq::RabbitMQClient;
use aquawatch_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{Alert, AlertStatus};

const SOURCE: &str = "aquawatch-alerts";

pub async fn publish_alert_created(rabbitmq: &RabbitMQClient, alert: &Alert) {
    let mut event = Event::new(
        SOURCE,
        routing_keys::ALERT_CREATED,
        payloads::AlertCreated {
            alert_id: alert.id,
            alert_type: alert.alert_type.to_string(),
            severity: alert.severity.to_string(),
        },
    );
    if let Some(creator) = alert.created_by {
        event = event.with_user(creator);
    }

    if let Err(e) = rabbitmq.publish(routing_keys::ALERT_CREATED, &event).await {
        tracing::error!(alert_id = %alert.id, error = %e, "failed to publish alert.created event");
    }
}

pub async fn publish_status_changed(rabbitmq: &RabbitMQClient, alert: &Alert, actor_id: Uuid) {
    let routing_key = match alert.status {
        AlertStatus::Acknowledged => routing_keys::ALERT_ACKNOWLEDGED,
        AlertStatus::Resolved => routing_keys::ALERT_RESOLVED,
        other => {
            tracing::debug!(alert_id = %alert.id, status = %other, "no event for status");
            return;
        }
    };

    let event = Event::new(
        SOURCE,
        routing_key,
        payloads::AlertStatusChanged {
            alert_id: alert.id,
            status: alert.status.to_string(),
            actor_id,
        },
    )
    .with_user(actor_id);

    if let Err(e) = rabbitmq.publish(routing_key, &event).await {
        tracing::error!(alert_id = %alert.id, routing_key, error = %e, "failed to publish alert status event");
    }
}
