//! Caller identity extraction.
//!
//! Authentication lives at the edge; handlers trust the `X-User-Id`
//! header the gateway forwards and the domain resolves it to a role.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user's ID, taken from `X-User-Id`.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed X-User-Id header".to_string()))?;

        let uuid = Uuid::parse_str(raw)
            .map_err(|e| ApiError::Unauthorized(format!("invalid X-User-Id: {e}")))?;
        Ok(UserId(uuid))
    }
}
