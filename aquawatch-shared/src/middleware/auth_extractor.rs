use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

/// Router state that knows the HS256 secret shared with the identity service.
pub trait JwtSecret {
    fn jwt_secret(&self) -> &str;
}

impl<T: JwtSecret + ?Sized> JwtSecret for Arc<T> {
    fn jwt_secret(&self) -> &str {
        (**self).jwt_secret()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: JwtSecret + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = decode_token(&token, state.jwt_secret())?;
        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))
}

/// Validate an HS256 token and return its claims.
///
/// Used by the bearer extractor and by WebSocket upgrades, which carry the
/// token in the `?token=` query parameter.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    if token_data.claims.is_expired() {
        return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
    }

    Ok(token_data.claims)
}

/// Require a role that may acknowledge, resolve, or raise alerts.
pub struct OfficerUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OfficerUser
where
    S: JwtSecret + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.can_manage_alerts() {
            return Err(AppError::new(ErrorCode::Forbidden, "officer access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn decodes_valid_token() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::DistrictOfficer, 300);
        let token = sign(&claims, "s3cret");

        let decoded = decode_token(&token, "s3cret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, UserRole::DistrictOfficer);
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::AshaWorker, 300);
        let token = sign(&claims, "s3cret");

        let err = decode_token(&token, "other").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TokenInvalid));
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::AshaWorker, -3600);
        let token = sign(&claims, "s3cret");

        let err = decode_token(&token, "s3cret").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TokenExpired));
    }

    struct TestState(&'static str);

    impl JwtSecret for TestState {
        fn jwt_secret(&self) -> &str {
            self.0
        }
    }

    fn parts_with_bearer(token: &str) -> Parts {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn extractor_uses_secret_from_state() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::StateAdmin, 300);
        let token = sign(&claims, "from-config");

        let state = Arc::new(TestState("from-config"));
        let user = AuthUser::from_request_parts(&mut parts_with_bearer(&token), &state)
            .await
            .unwrap();
        assert_eq!(user.id, claims.sub);

        let other = Arc::new(TestState("rotated"));
        let err = AuthUser::from_request_parts(&mut parts_with_bearer(&token), &other)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TokenInvalid));
    }

    #[tokio::test]
    async fn officer_gate_rejects_field_roles() {
        let state = TestState("s3cret");
        let token = sign(&Claims::new(Uuid::new_v4(), UserRole::AshaWorker, 300), "s3cret");
        let err = OfficerUser::from_request_parts(&mut parts_with_bearer(&token), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Token abc".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("Authorization", "Bearer abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }
}
