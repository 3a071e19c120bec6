use anyhow::{Context, anyhow};
use sqlx::PgPool;
use tracing::{info, instrument};

use opsdesk_core::{AppError, FieldErrors, PaginationMeta};
use opsdesk_db::unique_violation;
use opsdesk_models::{
    Email, ExternalIdentity, NewPrincipal, PaginatedPrincipalsResponse, Principal,
    PrincipalFilterParams, PrincipalId, PrincipalStatus, Role,
};

const PRINCIPAL_COLUMNS: &str = "id, name, email, password_hash, role, status, last_login_at, \
                                 created_at, updated_at, deleted_at";

const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Profile fields to change; `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
}

fn email_taken() -> AppError {
    let mut errors = FieldErrors::new();
    errors.add("email", EMAIL_TAKEN);
    AppError::validation(errors)
}

pub struct PrincipalService;

impl PrincipalService {
    /// Looks up a principal that can still authenticate (not soft-deleted).
    pub async fn find_by_id(db: &PgPool, id: PrincipalId) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(&format!(
            "SELECT {} FROM principals WHERE id = $1 AND deleted_at IS NULL",
            PRINCIPAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("Failed to fetch principal by ID")
        .map_err(AppError::database)?;

        Ok(principal)
    }

    pub async fn get(db: &PgPool, id: PrincipalId) -> Result<Principal, AppError> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Principal with id {} not found", id)))
    }

    pub async fn find_by_email(db: &PgPool, email: &Email) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(&format!(
            "SELECT {} FROM principals WHERE email = $1 AND deleted_at IS NULL",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("Failed to fetch principal by email")
        .map_err(AppError::database)?;

        Ok(principal)
    }

    pub async fn find_by_external_identity(
        db: &PgPool,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Principal>, AppError> {
        let columns = PRINCIPAL_COLUMNS
            .split(", ")
            .map(|c| format!("p.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let principal = sqlx::query_as::<_, Principal>(&format!(
            "SELECT {} FROM principals p \
             JOIN external_identities ei ON ei.principal_id = p.id \
             WHERE ei.provider = $1 AND ei.subject = $2 AND p.deleted_at IS NULL",
            columns
        ))
        .bind(provider)
        .bind(subject)
        .fetch_optional(db)
        .await
        .context("Failed to fetch principal by external identity")
        .map_err(AppError::database)?;

        Ok(principal)
    }

    /// Inserts a principal and, when given, its first external identity in one
    /// transaction. A principal is never stored without some way to log in.
    #[instrument(skip(db, new_principal), fields(principal.email = %new_principal.email))]
    pub async fn create(db: &PgPool, new_principal: NewPrincipal) -> Result<Principal, AppError> {
        new_principal
            .check_credentials()
            .map_err(|e| AppError::invalid_field("password", e.to_string()))?;

        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let principal = sqlx::query_as::<_, Principal>(&format!(
            "INSERT INTO principals (name, email, password_hash, role, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(&new_principal.name)
        .bind(&new_principal.email)
        .bind(&new_principal.password_hash)
        .bind(new_principal.role)
        .bind(new_principal.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => email_taken(),
            None => AppError::database(anyhow::Error::new(e).context("Failed to insert principal")),
        })?;

        if let Some((provider, subject)) = &new_principal.external_identity {
            Self::insert_identity(&mut tx, principal.id, provider, subject).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit principal")
            .map_err(AppError::database)?;

        info!(target: "auth", principal_id = %principal.id, principal_role = %principal.role, "Principal created");
        Ok(principal)
    }

    async fn insert_identity(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        principal_id: PrincipalId,
        provider: &str,
        subject: &str,
    ) -> Result<ExternalIdentity, AppError> {
        sqlx::query_as::<_, ExternalIdentity>(
            "INSERT INTO external_identities (principal_id, provider, subject) \
             VALUES ($1, $2, $3) \
             RETURNING id, principal_id, provider, subject, created_at",
        )
        .bind(principal_id)
        .bind(provider)
        .bind(subject)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::conflict(
                format!("The {} identity is already linked to another account.", provider),
                false,
            ),
            None => AppError::database(anyhow::Error::new(e).context("Failed to link identity")),
        })
    }

    /// Links an external identity to an existing principal. Identities already
    /// linked to any principal are refused.
    #[instrument(skip(db))]
    pub async fn link_identity(
        db: &PgPool,
        principal_id: PrincipalId,
        provider: &str,
        subject: &str,
    ) -> Result<ExternalIdentity, AppError> {
        Self::get(db, principal_id).await?;

        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;
        let identity = Self::insert_identity(&mut tx, principal_id, provider, subject).await?;
        tx.commit()
            .await
            .context("Failed to commit identity")
            .map_err(AppError::database)?;

        info!(target: "auth", principal_id = %principal_id, identity_provider = %provider, "External identity linked");
        Ok(identity)
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: PrincipalFilterParams,
    ) -> Result<PaginatedPrincipalsResponse, AppError> {
        let mut where_clause = String::from(" WHERE deleted_at IS NULL");
        let mut params: Vec<String> = Vec::new();

        if let Some(role) = &filters.role {
            params.push(role.clone());
            where_clause.push_str(&format!(" AND role::text = ${}", params.len()));
        }
        if let Some(status) = &filters.status {
            params.push(status.clone());
            where_clause.push_str(&format!(" AND status::text = ${}", params.len()));
        }
        if let Some(search) = &filters.search {
            params.push(format!("%{}%", search));
            where_clause.push_str(&format!(
                " AND (name ILIKE ${0} OR email ILIKE ${0})",
                params.len()
            ));
        }

        let count_query = format!("SELECT COUNT(*) FROM principals{}", where_clause);
        let mut count_sql = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_sql = count_sql.bind(param);
        }
        let total = count_sql
            .fetch_one(db)
            .await
            .context("Failed to count principals")
            .map_err(AppError::database)?;

        let data_query = format!(
            "SELECT {} FROM principals{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            PRINCIPAL_COLUMNS,
            where_clause,
            filters.pagination.per_page(),
            filters.pagination.offset()
        );
        let mut data_sql = sqlx::query_as::<_, Principal>(&data_query);
        for param in params {
            data_sql = data_sql.bind(param);
        }
        let data = data_sql
            .fetch_all(db)
            .await
            .context("Failed to fetch principals")
            .map_err(AppError::database)?;

        Ok(PaginatedPrincipalsResponse {
            data,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    #[instrument(skip(db))]
    pub async fn update_status(
        db: &PgPool,
        id: PrincipalId,
        status: PrincipalStatus,
    ) -> Result<Principal, AppError> {
        sqlx::query_as::<_, Principal>(&format!(
            "UPDATE principals SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(db)
        .await
        .context("Failed to update principal status")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow!("Principal with id {} not found", id)))
    }

    #[instrument(skip(db))]
    pub async fn update_role(
        db: &PgPool,
        id: PrincipalId,
        role: Role,
    ) -> Result<Principal, AppError> {
        sqlx::query_as::<_, Principal>(&format!(
            "UPDATE principals SET role = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await
        .context("Failed to update principal role")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow!("Principal with id {} not found", id)))
    }

    #[instrument(skip(db, changes))]
    pub async fn update_profile(
        db: &PgPool,
        id: PrincipalId,
        changes: ProfileChanges,
    ) -> Result<Principal, AppError> {
        sqlx::query_as::<_, Principal>(&format!(
            "UPDATE principals SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                password_hash = COALESCE($4, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            PRINCIPAL_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(db)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => email_taken(),
            None => AppError::database(anyhow::Error::new(e).context("Failed to update profile")),
        })?
        .ok_or_else(|| AppError::not_found(anyhow!("Principal with id {} not found", id)))
    }

    pub async fn touch_last_login(db: &PgPool, id: PrincipalId) -> Result<(), AppError> {
        sqlx::query("UPDATE principals SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("Failed to record login time")
            .map_err(AppError::database)?;
        Ok(())
    }

    /// Closes an account. The row stays so its email remains reserved.
    #[instrument(skip(db))]
    pub async fn soft_delete(db: &PgPool, id: PrincipalId) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE principals SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(db)
        .await
        .context("Failed to delete principal")
        .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!(
                "Principal with id {} not found",
                id
            )));
        }
        Ok(())
    }
}
