//! JWT claim structures for session tokens.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Claims carried by a session token.
///
/// The token only proves who issued it and which session it belongs to.
/// Whether the session is still live, and whether the principal may still
/// act, is decided against the store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    /// Principal ID (subject claim)
    pub sub: String,
    /// Session ID the token is bound to
    pub sid: String,
    pub email: String,
    /// Role at the time the token was issued; informational only
    pub role: String,
    /// Token expiration timestamp (Unix timestamp)
    pub exp: usize,
    /// Token issued-at timestamp (Unix timestamp)
    pub iat: usize,
}

impl SessionClaims {
    pub fn principal_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sid).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialize() {
        let claims = SessionClaims {
            sub: "principal-123".to_string(),
            sid: "session-1".to_string(),
            email: "test@example.com".to_string(),
            role: "manager".to_string(),
            exp: 1234567890,
            iat: 1234567800,
        };
        let serialized = serde_json::to_string(&claims).unwrap();
        assert!(serialized.contains(r#""sub":"principal-123""#));
        assert!(serialized.contains(r#""sid":"session-1""#));
        assert!(serialized.contains(r#""role":"manager""#));
    }

    #[test]
    fn test_ids_parse_only_when_valid() {
        let principal = Uuid::new_v4();
        let claims = SessionClaims {
            sub: principal.to_string(),
            sid: "not-a-uuid".to_string(),
            email: "a@b.com".to_string(),
            role: "employee".to_string(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.principal_id(), Some(principal));
        assert_eq!(claims.session_id(), None);
    }
}
