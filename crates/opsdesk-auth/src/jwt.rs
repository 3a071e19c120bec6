//! Session token creation and verification.
//!
//! A session token is an HS256 JWT binding a principal to one server-side
//! session row. Verification here covers signature and expiry only.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use opsdesk_config::JwtConfig;
use opsdesk_core::AppError;

use crate::claims::SessionClaims;

/// Creates a session token for `principal_id` bound to `session_id`.
///
/// # Errors
///
/// Returns an internal error if token encoding fails.
pub fn create_session_token(
    principal_id: Uuid,
    session_id: Uuid,
    email: &str,
    role: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + jwt_config.access_token_expiry.max(0) as usize;

    let claims = SessionClaims {
        sub: principal_id.to_string(),
        sid: session_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create token: {}", e)))
}

/// Verifies a session token's signature and expiry and returns its claims.
///
/// # Errors
///
/// Returns an unauthorized error when the token is malformed, expired, or
/// signed with another key.
pub fn verify_session_token(token: &str, jwt_config: &JwtConfig) -> Result<SessionClaims, AppError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::unauthorized(format!("Invalid or expired token: {}", e)))
}
