use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Alert errors
/// - E2xxx: Subscription errors
/// - E3xxx: Delivery errors
/// - E4xxx: Geography errors
/// - E5xxx: Risk scoring errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    BadRequest,
    TokenExpired,
    TokenInvalid,

    // Alerts (E1xxx)
    AlertNotFound,
    InvalidStatusTransition,
    UnknownAlertType,
    UnknownSeverity,

    // Subscriptions (E2xxx)
    SubscriptionNotFound,
    DuplicateSubscription,
    NoChannelsSelected,

    // Delivery (E3xxx)
    ResolutionFailed,
    RecipientNotFound,

    // Geography (E4xxx)
    VillageNotFound,
    DistrictNotFound,
    StateNotFound,
    ScopeMismatch,

    // Risk scoring (E5xxx)
    InvalidFeatures,
    ModelUnavailable,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::BadRequest => "E0007",
            Self::TokenExpired => "E0008",
            Self::TokenInvalid => "E0009",

            // Alerts
            Self::AlertNotFound => "E1001",
            Self::InvalidStatusTransition => "E1002",
            Self::UnknownAlertType => "E1003",
            Self::UnknownSeverity => "E1004",

            // Subscriptions
            Self::SubscriptionNotFound => "E2001",
            Self::DuplicateSubscription => "E2002",
            Self::NoChannelsSelected => "E2003",

            // Delivery
            Self::ResolutionFailed => "E3001",
            Self::RecipientNotFound => "E3002",

            // Geography
            Self::VillageNotFound => "E4001",
            Self::DistrictNotFound => "E4002",
            Self::StateNotFound => "E4003",
            Self::ScopeMismatch => "E4004",

            // Risk scoring
            Self::InvalidFeatures => "E5001",
            Self::ModelUnavailable => "E5002",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ResolutionFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable | Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::UnknownAlertType
            | Self::UnknownSeverity | Self::NoChannelsSelected | Self::ScopeMismatch
            | Self::InvalidFeatures => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::AlertNotFound | Self::SubscriptionNotFound
            | Self::RecipientNotFound | Self::VillageNotFound | Self::DistrictNotFound
            | Self::StateNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidStatusTransition | Self::DuplicateSubscription => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code carried by a known error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let (status, value) =
            body_json(AppError::new(ErrorCode::AlertNotFound, "alert not found")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E1001");
        assert_eq!(value["error"]["message"], "alert not found");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_are_forwarded() {
        let err = AppError::with_details(
            ErrorCode::ScopeMismatch,
            "district does not contain village",
            serde_json::json!({ "field": "district_id" }),
        );
        let (status, value) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"]["details"]["field"], "district_id");
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let (status, value) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["error"]["code"], "E0003");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, value) =
            body_json(AppError::Internal(anyhow::anyhow!("pool exhausted"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["message"], "internal server error");
    }

    #[test]
    fn transition_conflicts_are_409() {
        assert_eq!(ErrorCode::InvalidStatusTransition.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::ModelUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::ModelUnavailable.code(), "E5002");
    }
}
