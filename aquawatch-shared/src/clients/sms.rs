use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, ProviderReceipt};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// SMS and WhatsApp delivery through Twilio's Messages resource.
#[derive(Clone)]
pub struct SmsClient {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: Option<String>,
}

/// Transport used for a phone-addressed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneTransport {
    Sms,
    WhatsApp,
}

impl PhoneTransport {
    fn address(self, number: &str) -> String {
        match self {
            PhoneTransport::Sms => number.to_string(),
            PhoneTransport::WhatsApp => format!("whatsapp:{number}"),
        }
    }
}

impl SmsClient {
    pub fn new(client: Client, account_sid: &str, auth_token: &str, from_number: &str) -> Self {
        Self {
            client,
            api_base: TWILIO_API_BASE.to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.api_base, self.account_sid)
    }

    pub async fn send(
        &self,
        transport: PhoneTransport,
        to: &str,
        body: &str,
    ) -> Result<ProviderReceipt, ProviderError> {
        let from = transport.address(&self.from_number);
        let to_addr = transport.address(to);
        let form = [("From", from.as_str()), ("To", to_addr.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status: status.as_u16(), body });
        }

        let message: MessageResource = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        tracing::debug!(to = %to_addr, sid = %message.sid, "phone message queued");
        Ok(ProviderReceipt {
            external_id: message.sid,
            external_status: message.status,
        })
    }
}
