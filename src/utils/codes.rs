//! External identifier generation.
//!
//! Codes are a fixed prefix plus six random digits. The table's `UNIQUE`
//! constraint on the code column is what guarantees uniqueness; the
//! existence check only saves a round of insert-and-fail in the common case.
//! Soft-deleted rows keep their code, so they are checked as well.

use std::future::Future;

use anyhow::Context;
use rand::Rng;
use sqlx::PgPool;
use tracing::{debug, warn};

use opsdesk_core::{AppError, FieldErrors};
use opsdesk_db::unique_violation;

use crate::metrics::track_code_retry;

pub const MAX_CODE_ATTEMPTS: usize = 10;

pub fn generate_code(prefix: &str) -> String {
    format!("{}{:06}", prefix, rand::thread_rng().gen_range(0..1_000_000))
}

/// The column behind a `<table>_<column>_key` constraint name.
fn constrained_column<'a>(table: &str, constraint: &'a str) -> Option<&'a str> {
    constraint
        .strip_prefix(table)?
        .strip_prefix('_')?
        .strip_suffix("_key")
}

/// A 422 on `column` when `err` violated the table's `<table>_<column>_key`.
pub fn unique_field_error(table: &str, err: &sqlx::Error) -> Option<AppError> {
    let column = unique_violation(err).and_then(|c| constrained_column(table, c))?;
    let mut errors = FieldErrors::new();
    errors.add(
        column,
        format!("The {} has already been taken.", column.replace('_', " ")),
    );
    Some(AppError::validation(errors))
}

async fn code_in_use(
    db: &PgPool,
    table: &'static str,
    column: &'static str,
    code: &str,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
        table, column
    ))
    .bind(code)
    .fetch_one(db)
    .await
    .context("Failed to check identifier")
    .map_err(AppError::database)
}

/// Draws codes until `insert` succeeds without colliding on `column`, giving
/// up with a retryable 409 after [`MAX_CODE_ATTEMPTS`].
///
/// A unique violation on any other column of `table` (an email inserted by a
/// concurrent request, say) becomes a validation error on that column.
pub async fn insert_with_unique_code<T, F, Fut>(
    db: &PgPool,
    table: &'static str,
    column: &'static str,
    prefix: &str,
    mut insert: F,
) -> Result<T, AppError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate_code(prefix);

        if code_in_use(db, table, column, &code).await? {
            debug!(target: "database", table, code = %code, attempt, "Identifier already in use, redrawing");
            track_code_retry(table);
            continue;
        }

        let err = match insert(code.clone()).await {
            Ok(row) => return Ok(row),
            Err(err) => err,
        };

        match unique_violation(&err).and_then(|c| constrained_column(table, c)) {
            Some(violated) if violated == column => {
                debug!(target: "database", table, code = %code, attempt, "Identifier collided on insert, redrawing");
                track_code_retry(table);
            }
            _ => {
                return Err(unique_field_error(table, &err).unwrap_or_else(|| {
                    AppError::database(
                        anyhow::Error::new(err).context(format!("Failed to insert into {}", table)),
                    )
                }));
            }
        }
    }

    warn!(target: "database", table, attempts = MAX_CODE_ATTEMPTS, "Could not allocate a unique identifier");
    Err(AppError::conflict(
        "Could not allocate a unique identifier. Please retry.",
        true,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_prefix_and_six_digits() {
        for _ in 0..100 {
            let code = generate_code("CUST");
            assert_eq!(code.len(), 10);
            assert!(code.starts_with("CUST"));
            assert!(code[4..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_constrained_column() {
        assert_eq!(
            constrained_column("customers", "customers_customer_code_key"),
            Some("customer_code")
        );
        assert_eq!(constrained_column("vendors", "vendors_tax_id_key"), Some("tax_id"));
        assert_eq!(constrained_column("vendors", "customers_email_key"), None);
    }
}
