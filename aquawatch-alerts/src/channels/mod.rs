//! Per-channel delivery adapters.
//!
//! Adapters never fail the caller: every problem (missing contact details,
//! provider errors) comes back as a failed [`ChannelOutcome`] that the
//! dispatcher logs before moving on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use aquawatch_shared::clients::email::EmailClient;
use aquawatch_shared::clients::sms::{PhoneTransport, SmsClient};

use crate::config::AppConfig;
use crate::models::{Alert, Channel, DeliveryResponse, DeliveryStatus, GeoScope, Recipient, Template};
use crate::push::PushHub;
use crate::templates::{self, MessageContext, RenderedMessage};

pub mod email;
pub mod in_app;
pub mod phone;

pub use email::EmailAdapter;
pub use in_app::{DashboardAdapter, PushAdapter};
pub use phone::PhoneAdapter;

/// Whether external providers are actually called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Call providers that have credentials; simulate the rest.
    #[default]
    Live,
    /// Never call a provider.
    Simulated,
}

/// Everything an adapter needs for one (alert, recipient) pair.
pub struct DeliveryContext<'a> {
    pub alert: &'a Alert,
    pub recipient: &'a Recipient,
    pub scope: &'a GeoScope,
    pub template: Option<&'a Template>,
}

impl DeliveryContext<'_> {
    pub fn render(&self, channel: Channel) -> RenderedMessage {
        let ctx = MessageContext::new(self.alert, self.scope);
        templates::render_for(channel, &ctx, self.template)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub success: bool,
    pub status: DeliveryStatus,
    pub response: DeliveryResponse,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn sent(response: DeliveryResponse) -> Self {
        Self {
            success: true,
            status: DeliveryStatus::Sent,
            response,
            error: None,
        }
    }

    pub fn delivered(response: DeliveryResponse) -> Self {
        Self {
            success: true,
            status: DeliveryStatus::Delivered,
            response,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, response: DeliveryResponse) -> Self {
        Self {
            success: false,
            status: DeliveryStatus::Failed,
            response,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    async fn deliver(&self, ctx: &DeliveryContext<'_>) -> ChannelOutcome;
}

/// Adapter lookup by channel.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel)
    }

    /// Production wiring: providers get clients only when configured.
    pub fn from_config(config: &AppConfig, hub: PushHub) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()?;

        let email = config.email_configured().then(|| {
            EmailClient::new(http.clone(), &config.resend_api_key, &config.from_email, &config.from_name)
        });
        let sms = config.twilio_configured().then(|| {
            SmsClient::new(
                http.clone(),
                &config.twilio_account_sid,
                &config.twilio_auth_token,
                &config.twilio_phone_number,
            )
        });

        if config.delivery_mode == DeliveryMode::Simulated {
            tracing::info!("delivery mode is simulated, providers will not be called");
        } else {
            tracing::info!(
                email = email.is_some(),
                sms = sms.is_some(),
                "channel providers configured"
            );
        }

        Ok(Self::new()
            .with(Arc::new(EmailAdapter::new(email, config.delivery_mode)))
            .with(Arc::new(PhoneAdapter::new(PhoneTransport::Sms, sms.clone(), config.delivery_mode)))
            .with(Arc::new(PhoneAdapter::new(PhoneTransport::WhatsApp, sms, config.delivery_mode)))
            .with(Arc::new(PushAdapter))
            .with(Arc::new(DashboardAdapter::new(hub))))
    }
}
