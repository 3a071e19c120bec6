//! The business entity validation pipeline.
//!
//! Runs in a fixed order and accumulates every failure into one
//! [`FieldErrors`] map:
//!
//! 1. field rules (format, length, range, membership, date ordering)
//! 2. store rules (uniqueness within the entity table, account manager exists)
//! 3. each `additional_contacts[i]`, keyed `additional_contacts.<i>.<field>`
//! 4. cross-field business rules, only when 1-3 found nothing
//!
//! The result is either a normalized, typed input or a 422. Nothing is ever
//! partially accepted.

use anyhow::Context;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use opsdesk_core::{AppError, FieldErrors};
use opsdesk_models::{EntityInput, EntityPayload, check_business_rules};

fn attribute(column: &str) -> String {
    column.replace('_', " ")
}

/// Steps 1 and 3: everything that needs no store access.
pub fn local_rules<P: EntityPayload>(payload: &P) -> FieldErrors {
    let mut errors = payload.field_rules();
    for (index, contact) in payload.additional_contacts().iter().enumerate() {
        errors.merge_prefixed(
            &format!("additional_contacts.{}", index),
            contact.field_rules(),
        );
    }
    errors
}

/// Step 2. Uniqueness counts soft-deleted rows too, since their values stay
/// reserved, and ignores the row being updated.
async fn store_rules<P: EntityPayload>(
    db: &PgPool,
    payload: &P,
    known: &FieldErrors,
    exclude_id: Option<Uuid>,
) -> Result<FieldErrors, AppError> {
    let mut errors = FieldErrors::new();

    for field in payload.unique_fields() {
        if known.contains(field.column) {
            continue;
        }
        let taken = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1 AND ($2::uuid IS NULL OR id <> $2))",
            P::TABLE,
            field.column
        ))
        .bind(&field.value)
        .bind(exclude_id)
        .fetch_one(db)
        .await
        .context("Failed to check uniqueness")
        .map_err(AppError::database)?;

        if taken {
            errors.add(
                field.column,
                format!("The {} has already been taken.", attribute(field.column)),
            );
        }
    }

    if let Some(manager_id) = payload.account_manager_id() {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM principals WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(manager_id)
        .fetch_one(db)
        .await
        .context("Failed to check account manager")
        .map_err(AppError::database)?;

        if !exists {
            errors.add("account_manager_id", "The selected account manager is invalid.");
        }
    }

    Ok(errors)
}

/// Step 4, on a payload that passed steps 1-3.
pub fn business_rules<P: EntityPayload>(payload: P) -> Result<P::Input, AppError> {
    let input = payload
        .into_input()
        .ok_or_else(|| AppError::internal_error("validated payload could not be converted"))?;

    let errors = check_business_rules(&input.business_facts());
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }
    Ok(input)
}

/// Validates a create (`exclude_id = None`) or update body for an entity.
#[instrument(skip(db, payload), fields(table = P::TABLE))]
pub async fn validate_entity<P: EntityPayload>(
    db: &PgPool,
    payload: P,
    exclude_id: Option<Uuid>,
) -> Result<P::Input, AppError> {
    let payload = payload.normalize();

    let mut errors = local_rules(&payload);
    let store_errors = store_rules(db, &payload, &errors, exclude_id).await?;
    errors.merge(store_errors);

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    business_rules(payload)
}
