use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, ProviderReceipt};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Transactional email over the Resend HTTP API.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    endpoint: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

impl EmailClient {
    pub fn new(client: Client, api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client,
            endpoint: RESEND_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    /// Point the client at a different API base, e.g. a local sandbox.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn sender(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Send a plain-text message and return the provider's message id.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<ProviderReceipt, ProviderError> {
        let request = ResendRequest {
            from: self.sender(),
            to: [to],
            subject,
            text: body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status: status.as_u16(), body });
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        tracing::debug!(to = %to, subject = %subject, message_id = %parsed.id, "email sent");
        Ok(ProviderReceipt {
            external_id: parsed.id,
            external_status: Some("sent".to_string()),
        })
    }
}
