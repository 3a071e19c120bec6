//! Server-side login sessions.
//!
//! The session token only names a session; this row decides whether it is
//! still usable. Revoking a session also replaces its anti-forgery token so
//! anything the client kept is dead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::ids::{PrincipalId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: PrincipalId,
    #[serde(skip)]
    pub csrf_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_live(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// A live session owned by `principal_id`.
    pub fn is_usable_by(&self, principal_id: PrincipalId) -> bool {
        self.is_live() && self.principal_id == principal_id
    }
}

/// Where a login came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_session_is_unusable() {
        let owner = PrincipalId::new();
        let mut session = Session {
            id: SessionId::new(),
            principal_id: owner,
            csrf_token: "csrf".to_string(),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
            revoked_at: None,
        };
        assert!(session.is_usable_by(owner));
        assert!(!session.is_usable_by(PrincipalId::new()));

        session.revoked_at = Some(Utc::now());
        assert!(!session.is_usable_by(owner));
    }
}
