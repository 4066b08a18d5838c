use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{ChannelAdapter, ChannelOutcome, DeliveryContext};
use crate::models::{Channel, DeliveryResponse};
use crate::push::{AlertGroup, AlertPayload, PushHub, PushMessage};

/// Mobile push. No provider is integrated, so every send is simulated.
pub struct PushAdapter;

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn deliver(&self, ctx: &DeliveryContext<'_>) -> ChannelOutcome {
        let message = ctx.render(Channel::Push);
        tracing::debug!(alert_id = %ctx.alert.id, user_id = %ctx.recipient.id, "push simulated");
        ChannelOutcome::sent(DeliveryResponse::simulated(None, message.body))
    }
}

/// Pushes the alert to the subscriber's personal live stream.
pub struct DashboardAdapter {
    hub: PushHub,
}

impl DashboardAdapter {
    pub fn new(hub: PushHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl ChannelAdapter for DashboardAdapter {
    fn channel(&self) -> Channel {
        Channel::Dashboard
    }

    async fn deliver(&self, ctx: &DeliveryContext<'_>) -> ChannelOutcome {
        let message = PushMessage::NewAlert {
            alert: AlertPayload::new(ctx.alert, ctx.scope),
        };
        // Nobody watching is fine: the alert stays visible on the dashboard.
        let listeners = self.hub.publish(AlertGroup::User(ctx.recipient.id), Arc::new(message));
        ChannelOutcome::delivered(DeliveryResponse {
            listeners: Some(listeners),
            ..Default::default()
        })
    }
}
