use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use aquawatch_shared::types::event::routing_keys;

use crate::AppState;

const QUEUE: &str = "aquawatch-alerts.pipeline";

/// Consume alert lifecycle events and run push fan-out and delivery.
pub async fn listen_alert_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(QUEUE, &[routing_keys::ALERT_ALL], state.config.event_prefetch)
        .await?;

    tracing::info!("listening for alert events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                if let Err(e) = state.pipeline.handle(&routing_key, &delivery.data).await {
                    tracing::error!(routing_key = %routing_key, error = %e, "failed to process alert event");
                }

                // Failures are logged, not redelivered: fan-out is best-effort.
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    tracing::error!(error = %e, "failed to ack alert event");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "error receiving alert event");
            }
        }
    }

    Ok(())
}
