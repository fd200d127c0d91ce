//! Boundary with the external authentication collaborator.
//!
//! Session issuance lives outside this crate; requests arrive carrying an
//! HS256 bearer token whose claims identify the principal. This module
//! verifies the token and exposes the principal to handlers, plus the
//! capability predicates that keep authorization out of the state machines.

pub mod permissions;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::AppState;

/// Bearer-token claims supplied by the auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    pub role: Role,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated principal attached to every engine call.
///
/// Role changes made by the verification workflow invalidate outstanding
/// tokens through the `sign_out` signal; this struct only reflects what the
/// token said at issuance time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub is_admin: bool,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, is_admin: bool) -> Self {
        Self {
            user_id,
            role,
            is_admin,
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("malformed authorization header".to_string()))?;

        let claims = verify_token(token, &state.config.jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid subject claim".to_string()))?;

        Ok(Principal::new(user_id, claims.role, claims.is_admin))
    }
}

/// Verify an HS256 token and return its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;
    Ok(data.claims)
}

/// Issue a short-lived token for a principal. Used by the test harness and
/// local tooling; production tokens come from the auth collaborator.
pub fn issue_token(principal: &Principal, secret: &str) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: principal.user_id.to_string(),
        role: principal.role,
        is_admin: principal.is_admin,
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {e}")))
}
