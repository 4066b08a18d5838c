use async_trait::async_trait;

use aquawatch_shared::clients::sms::{PhoneTransport, SmsClient};

use crate::channels::{ChannelAdapter, ChannelOutcome, DeliveryContext, DeliveryMode};
use crate::models::{Channel, DeliveryResponse};

/// SMS or WhatsApp, both through the same messaging provider.
pub struct PhoneAdapter {
    transport: PhoneTransport,
    client: Option<SmsClient>,
    mode: DeliveryMode,
}

impl PhoneAdapter {
    pub fn new(transport: PhoneTransport, client: Option<SmsClient>, mode: DeliveryMode) -> Self {
        Self { transport, client, mode }
    }
}

#[async_trait]
impl ChannelAdapter for PhoneAdapter {
    fn channel(&self) -> Channel {
        match self.transport {
            PhoneTransport::Sms => Channel::Sms,
            PhoneTransport::WhatsApp => Channel::WhatsApp,
        }
    }

    async fn deliver(&self, ctx: &DeliveryContext<'_>) -> ChannelOutcome {
        let channel = self.channel();
        let Some(number) = ctx.recipient.phone_number.as_deref().filter(|n| !n.trim().is_empty()) else {
            return ChannelOutcome::failed("recipient has no phone number", DeliveryResponse::default());
        };

        let body = ctx.render(channel).body;

        let client = match (&self.client, self.mode) {
            (Some(client), DeliveryMode::Live) => client,
            _ => {
                tracing::info!(alert_id = %ctx.alert.id, channel = %channel, "phone message simulated");
                return ChannelOutcome::sent(DeliveryResponse::simulated(Some(number.to_string()), body));
            }
        };

        match client.send(self.transport, number, &body).await {
            Ok(receipt) => ChannelOutcome::sent(DeliveryResponse {
                address: Some(number.to_string()),
                external_id: Some(receipt.external_id),
                external_status: receipt.external_status,
                ..Default::default()
            }),
            Err(e) => {
                tracing::warn!(alert_id = %ctx.alert.id, channel = %channel, error = %e, "phone delivery failed");
                ChannelOutcome::failed(
                    e.to_string(),
                    DeliveryResponse { address: Some(number.to_string()), ..Default::default() },
                )
            }
        }
    }
}
