use std::sync::Arc;

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;

use crate::types::Event;

const EXCHANGE_NAME: &str = "aquawatch.events";

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("cannot encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker rejected event on {0}")]
    Nacked(String),
}

/// Topic-exchange client for alert lifecycle events.
///
/// Publishing runs on a confirm-mode channel so a created alert is only
/// reported as announced once the broker has taken responsibility for it.
/// Each consumer gets its own channel with a prefetch limit, since one
/// event can hold a delivery round open for as long as the providers take.
#[derive(Clone)]
pub struct RabbitMQClient {
    connection: Arc<Connection>,
    publisher: Channel,
}

impl RabbitMQClient {
    pub async fn connect(url: &str) -> Result<Self, EventBusError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let publisher = connection.create_channel().await?;

        publisher
            .exchange_declare(
                EXCHANGE_NAME,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        publisher.confirm_select(ConfirmSelectOptions::default()).await?;

        tracing::info!(exchange = EXCHANGE_NAME, "connected to RabbitMQ");
        Ok(Self { connection: Arc::new(connection), publisher })
    }

    /// Publish a persistent JSON event and wait for the broker's confirm.
    ///
    /// Events nobody is bound to are confirmed but come back as returns;
    /// those are logged, not treated as failures.
    pub async fn publish<T: Serialize>(&self, routing_key: &str, event: &Event<T>) -> Result<(), EventBusError> {
        let payload = serde_json::to_vec(event)?;

        let confirmation = self
            .publisher
            .basic_publish(
                EXCHANGE_NAME,
                routing_key,
                BasicPublishOptions { mandatory: true, ..Default::default() },
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => return Err(EventBusError::Nacked(routing_key.to_string())),
            Confirmation::Ack(Some(_)) => {
                tracing::warn!(routing_key = %routing_key, event_id = %event.id, "event unroutable, no queue bound");
            }
            Confirmation::Ack(None) | Confirmation::NotRequested => {
                tracing::debug!(routing_key = %routing_key, event_id = %event.id, "event published");
            }
        }
        Ok(())
    }

    /// Declare a durable queue bound to `routing_keys` and consume it on a
    /// dedicated channel holding at most `prefetch` unacked events.
    pub async fn subscribe(
        &self,
        queue_name: &str,
        routing_keys: &[&str],
        prefetch: u16,
    ) -> Result<Consumer, EventBusError> {
        let channel = self.connection.create_channel().await?;
        channel.basic_qos(prefetch, BasicQosOptions::default()).await?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;

        for key in routing_keys {
            channel
                .queue_bind(queue_name, EXCHANGE_NAME, key, QueueBindOptions::default(), FieldTable::default())
                .await?;
        }

        let consumer = channel
            .basic_consume(
                queue_name,
                &format!("{queue_name}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %queue_name, bindings = ?routing_keys, prefetch, "consuming alert events");
        Ok(consumer)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.publisher.status().connected()
    }
}
