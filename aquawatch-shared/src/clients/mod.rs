pub mod db;
pub mod email;
pub mod rabbitmq;
pub mod sms;

/// Failure reported by an outbound messaging provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Identifier and state the provider assigned to an accepted message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReceipt {
    pub external_id: String,
    pub external_status: Option<String>,
}
