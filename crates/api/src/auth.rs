//! Principal extraction.
//!
//! Authentication itself (passwords, tokens) lives in an upstream gateway;
//! by the time a request reaches this service the gateway has resolved the
//! caller and forwarded the identity as trusted headers. This extractor only
//! turns those headers into a [`Principal`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Principal, Role, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated caller, extracted from `x-user-id` / `x-user-role`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|e| ApiError::Unauthorized(format!("invalid x-user-id: {e}")))?;

        let role = match parts
            .headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
        {
            None => Role::Customer,
            Some(raw) => Role::parse(raw)
                .ok_or_else(|| ApiError::Unauthorized(format!("unknown role: {raw}")))?,
        };

        Ok(AuthUser(Principal {
            user_id: UserId::from_uuid(user_id),
            role,
        }))
    }
}
