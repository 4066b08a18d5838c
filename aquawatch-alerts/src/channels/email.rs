use async_trait::async_trait;

use aquawatch_shared::clients::email::EmailClient;

use crate::channels::{ChannelAdapter, ChannelOutcome, DeliveryContext, DeliveryMode};
use crate::models::{Channel, DeliveryResponse};

pub struct EmailAdapter {
    client: Option<EmailClient>,
    mode: DeliveryMode,
}

impl EmailAdapter {
    pub fn new(client: Option<EmailClient>, mode: DeliveryMode) -> Self {
        Self { client, mode }
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn deliver(&self, ctx: &DeliveryContext<'_>) -> ChannelOutcome {
        let Some(address) = ctx.recipient.email.as_deref().filter(|a| !a.trim().is_empty()) else {
            return ChannelOutcome::failed("recipient has no email address", DeliveryResponse::default());
        };

        let message = ctx.render(Channel::Email);
        let subject = message.subject.unwrap_or_default();

        let client = match (&self.client, self.mode) {
            (Some(client), DeliveryMode::Live) => client,
            _ => {
                tracing::info!(alert_id = %ctx.alert.id, to = %address, "email simulated");
                return ChannelOutcome::sent(DeliveryResponse::simulated(Some(address.to_string()), message.body));
            }
        };

        match client.send_email(address, &subject, &message.body).await {
            Ok(receipt) => ChannelOutcome::sent(DeliveryResponse {
                address: Some(address.to_string()),
                external_id: Some(receipt.external_id),
                external_status: receipt.external_status,
                ..Default::default()
            }),
            Err(e) => {
                tracing::warn!(alert_id = %ctx.alert.id, error = %e, "email delivery failed");
                ChannelOutcome::failed(
                    e.to_string(),
                    DeliveryResponse { address: Some(address.to_string()), ..Default::default() },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::tests::{context_parts, serve_json};
    use crate::models::DeliveryStatus;

    #[tokio::test]
    async fn missing_address_fails() {
        let (alert, mut recipient, scope) = context_parts();
        recipient.email = Some("  ".into());
        let ctx = DeliveryContext { alert: &alert, recipient: &recipient, scope: &scope, template: None };

        let outcome = EmailAdapter::new(None, DeliveryMode::Live).deliver(&ctx).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, DeliveryStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("recipient has no email address"));
    }

    #[tokio::test]
    async fn unconfigured_provider_simulates() {
        let (alert, recipient, scope) = context_parts();
        let ctx = DeliveryContext { alert: &alert, recipient: &recipient, scope: &scope, template: None };

        let outcome = EmailAdapter::new(None, DeliveryMode::Live).deliver(&ctx).await;
        assert!(outcome.success);
        assert!(outcome.response.simulated);
        assert_eq!(outcome.response.address, recipient.email);
    }

    #[tokio::test]
    async fn live_provider_returns_message_id() {
        let base = serve_json("/emails", serde_json::json!({ "id": "re_123" })).await;
        let client = EmailClient::new(reqwest::Client::new(), "key", "alerts@aquawatch.local", "AquaWatch")
            .with_endpoint(format!("{base}/emails"));
        let (alert, recipient, scope) = context_parts();
        let ctx = DeliveryContext { alert: &alert, recipient: &recipient, scope: &scope, template: None };

        let outcome = EmailAdapter::new(Some(client.clone()), DeliveryMode::Live).deliver(&ctx).await;
        assert!(outcome.success);
        assert_eq!(outcome.response.external_id.as_deref(), Some("re_123"));
        assert!(!outcome.response.simulated);

        // simulated mode wins over credentials
        let outcome = EmailAdapter::new(Some(client), DeliveryMode::Simulated).deliver(&ctx).await;
        assert!(outcome.response.simulated);
    }

    #[tokio::test]
    async fn transport_errors_become_failed_outcomes() {
        let client = EmailClient::new(reqwest::Client::new(), "key", "alerts@aquawatch.local", "AquaWatch")
            .with_endpoint("http://127.0.0.1:1/emails");
        let (alert, recipient, scope) = context_parts();
        let ctx = DeliveryContext { alert: &alert, recipient: &recipient, scope: &scope, template: None };

        let outcome = EmailAdapter::new(Some(client), DeliveryMode::Live).deliver(&ctx).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
