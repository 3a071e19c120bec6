use anyhow::Context;
use rand::{Rng, distributions::Alphanumeric};
use sqlx::PgPool;
use tracing::instrument;

use opsdesk_core::AppError;
use opsdesk_models::{ClientContext, PrincipalId, Session, SessionId};

const CSRF_TOKEN_LENGTH: usize = 40;

const SESSION_COLUMNS: &str =
    "id, principal_id, csrf_token, ip_address, user_agent, created_at, revoked_at";

pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub struct SessionService;

impl SessionService {
    /// Opens a fresh session with its own id and anti-forgery token.
    #[instrument(skip(db))]
    pub async fn create(
        db: &PgPool,
        principal_id: PrincipalId,
        client: &ClientContext,
    ) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (id, principal_id, csrf_token, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(SessionId::new())
        .bind(principal_id)
        .bind(generate_csrf_token())
        .bind(&client.ip_address)
        .bind(&client.user_agent)
        .fetch_one(db)
        .await
        .context("Failed to create session")
        .map_err(AppError::database)?;

        Ok(session)
    }

    pub async fn find(db: &PgPool, id: SessionId) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("Failed to fetch session")
        .map_err(AppError::database)?;

        Ok(session)
    }

    /// Revokes a session and replaces its anti-forgery token. Returns whether
    /// a live session was revoked; revoking twice is a no-op.
    #[instrument(skip(db))]
    pub async fn revoke(db: &PgPool, id: SessionId) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), csrf_token = $2 \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(generate_csrf_token())
        .execute(db)
        .await
        .context("Failed to revoke session")
        .map_err(AppError::database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every live session of a principal, e.g. on deactivation.
    #[instrument(skip(db))]
    pub async fn revoke_all_for_principal(
        db: &PgPool,
        principal_id: PrincipalId,
    ) -> Result<u64, AppError> {
        // md5 over a random uuid gives every row its own replacement token.
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), csrf_token = md5(gen_random_uuid()::text) \
             WHERE principal_id = $1 AND revoked_at IS NULL",
        )
        .bind(principal_id)
        .execute(db)
        .await
        .context("Failed to revoke principal sessions")
        .map_err(AppError::database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_tokens_are_random_alphanumerics() {
        let first = generate_csrf_token();
        let second = generate_csrf_token();
        assert_eq!(first.len(), CSRF_TOKEN_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
