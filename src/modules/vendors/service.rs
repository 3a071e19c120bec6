use anyhow::{Context, anyhow};
use sqlx::{PgPool, types::Json};
use tracing::{info, instrument};

use opsdesk_core::{AppError, PaginationMeta};
use opsdesk_models::{
    PaginatedVendorsResponse, PrincipalId, VENDOR_CODE_PREFIX, Vendor, VendorFilterParams,
    VendorId, VendorInput,
};

use crate::metrics::track_entity_created;
use crate::utils::codes::{insert_with_unique_code, unique_field_error};

const TABLE: &str = "vendors";

const VENDOR_COLUMNS: &str = "id, vendor_code, name, service_category, tax_id, status, priority, \
    email, phone, website, address_line1, address_line2, city, state, postal_code, country, \
    credit_limit, outstanding_balance, payment_terms, currency, first_contact_date, \
    last_contact_date, contract_start_date, contract_end_date, tags, notes, account_manager_id, \
    additional_contacts, created_by, created_at, updated_at, deleted_at";

fn log_financial_terms(action: &str, vendor: &Vendor, actor: PrincipalId) {
    let credit_limit = vendor
        .credit_limit
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "none".to_string());
    let tax_id = vendor.tax_id.as_deref().unwrap_or("none");
    info!(
        target: "financial",
        action,
        vendor_id = %vendor.id,
        vendor_code = %vendor.vendor_code,
        tax_id,
        credit_limit = %credit_limit,
        outstanding_balance = %vendor.outstanding_balance,
        currency = %vendor.currency,
        actor_id = %actor,
        "Vendor financial terms recorded"
    );
}

pub struct VendorService;

impl VendorService {
    /// Inserts a validated vendor under a freshly generated `VEND` code.
    #[instrument(skip(db, input))]
    pub async fn create(
        db: &PgPool,
        input: VendorInput,
        created_by: PrincipalId,
    ) -> Result<Vendor, AppError> {
        let sql = format!(
            "INSERT INTO vendors (vendor_code, name, service_category, tax_id, status, priority, \
             email, phone, website, address_line1, address_line2, city, state, postal_code, \
             country, credit_limit, outstanding_balance, payment_terms, currency, \
             first_contact_date, last_contact_date, contract_start_date, contract_end_date, tags, \
             notes, account_manager_id, additional_contacts, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28) \
             RETURNING {}",
            VENDOR_COLUMNS
        );
        let sql = sql.as_str();
        let input = &input;

        let vendor = insert_with_unique_code(
            db,
            TABLE,
            "vendor_code",
            VENDOR_CODE_PREFIX,
            |code| async move {
                sqlx::query_as::<_, Vendor>(sql)
                    .bind(code)
                    .bind(&input.name)
                    .bind(&input.service_category)
                    .bind(&input.tax_id)
                    .bind(input.status)
                    .bind(input.priority)
                    .bind(&input.email)
                    .bind(&input.phone)
                    .bind(&input.website)
                    .bind(&input.address_line1)
                    .bind(&input.address_line2)
                    .bind(&input.city)
                    .bind(&input.state)
                    .bind(&input.postal_code)
                    .bind(&input.country)
                    .bind(input.credit_limit)
                    .bind(input.outstanding_balance)
                    .bind(input.payment_terms)
                    .bind(&input.currency)
                    .bind(input.first_contact_date)
                    .bind(input.last_contact_date)
                    .bind(input.contract_start_date)
                    .bind(input.contract_end_date)
                    .bind(&input.tags)
                    .bind(&input.notes)
                    .bind(input.account_manager_id)
                    .bind(Json(&input.additional_contacts))
                    .bind(created_by)
                    .fetch_one(db)
                    .await
            },
        )
        .await?;

        info!(target: "api", vendor_id = %vendor.id, vendor_code = %vendor.vendor_code, "Vendor created");
        log_financial_terms("created", &vendor, created_by);
        track_entity_created(TABLE);
        Ok(vendor)
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: VendorFilterParams,
    ) -> Result<PaginatedVendorsResponse, AppError> {
        let mut where_clause = String::from(" WHERE deleted_at IS NULL");
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = &filters.status {
            params.push(status.clone());
            where_clause.push_str(&format!(" AND status::text = ${}", params.len()));
        }
        if let Some(priority) = &filters.priority {
            params.push(priority.clone());
            where_clause.push_str(&format!(" AND priority::text = ${}", params.len()));
        }
        if let Some(category) = &filters.service_category {
            params.push(category.clone());
            where_clause.push_str(&format!(" AND service_category = ${}", params.len()));
        }
        if let Some(search) = &filters.search {
            params.push(format!("%{}%", search));
            where_clause.push_str(&format!(
                " AND (name ILIKE ${0} OR vendor_code ILIKE ${0} OR email ILIKE ${0} OR tax_id ILIKE ${0})",
                params.len()
            ));
        }

        let count_query = format!("SELECT COUNT(*) FROM vendors{}", where_clause);
        let mut count_sql = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_sql = count_sql.bind(param);
        }
        let total = count_sql
            .fetch_one(db)
            .await
            .context("Failed to count vendors")
            .map_err(AppError::database)?;

        let data_query = format!(
            "SELECT {} FROM vendors{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            VENDOR_COLUMNS,
            where_clause,
            filters.pagination.per_page(),
            filters.pagination.offset()
        );
        let mut data_sql = sqlx::query_as::<_, Vendor>(&data_query);
        for param in params {
            data_sql = data_sql.bind(param);
        }
        let data = data_sql
            .fetch_all(db)
            .await
            .context("Failed to fetch vendors")
            .map_err(AppError::database)?;

        Ok(PaginatedVendorsResponse {
            data,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    pub async fn get(db: &PgPool, id: VendorId) -> Result<Vendor, AppError> {
        sqlx::query_as::<_, Vendor>(&format!(
            "SELECT {} FROM vendors WHERE id = $1 AND deleted_at IS NULL",
            VENDOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("Failed to fetch vendor by ID")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow!("Vendor with id {} not found", id)))
    }

    #[instrument(skip(db, input))]
    pub async fn update(
        db: &PgPool,
        id: VendorId,
        input: VendorInput,
        actor: PrincipalId,
    ) -> Result<Vendor, AppError> {
        let before = Self::get(db, id).await?;

        let vendor = sqlx::query_as::<_, Vendor>(&format!(
            "UPDATE vendors SET name = $2, service_category = $3, tax_id = $4, status = $5, \
             priority = $6, email = $7, phone = $8, website = $9, address_line1 = $10, \
             address_line2 = $11, city = $12, state = $13, postal_code = $14, country = $15, \
             credit_limit = $16, outstanding_balance = $17, payment_terms = $18, currency = $19, \
             first_contact_date = $20, last_contact_date = $21, contract_start_date = $22, \
             contract_end_date = $23, tags = $24, notes = $25, account_manager_id = $26, \
             additional_contacts = $27, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            VENDOR_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.service_category)
        .bind(&input.tax_id)
        .bind(input.status)
        .bind(input.priority)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.credit_limit)
        .bind(input.outstanding_balance)
        .bind(input.payment_terms)
        .bind(&input.currency)
        .bind(input.first_contact_date)
        .bind(input.last_contact_date)
        .bind(input.contract_start_date)
        .bind(input.contract_end_date)
        .bind(&input.tags)
        .bind(&input.notes)
        .bind(input.account_manager_id)
        .bind(Json(&input.additional_contacts))
        .fetch_optional(db)
        .await
        .map_err(|e| {
            unique_field_error(TABLE, &e).unwrap_or_else(|| {
                AppError::database(anyhow::Error::new(e).context("Failed to update vendor"))
            })
        })?
        .ok_or_else(|| AppError::not_found(anyhow!("Vendor with id {} not found", id)))?;

        info!(target: "api", vendor_id = %vendor.id, "Vendor updated");
        if before.credit_limit != vendor.credit_limit
            || before.outstanding_balance != vendor.outstanding_balance
            || before.currency != vendor.currency
            || before.tax_id != vendor.tax_id
        {
            log_financial_terms("updated", &vendor, actor);
        }
        Ok(vendor)
    }

    /// Soft-deletes a vendor; its code, email and tax id stay reserved.
    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, id: VendorId) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE vendors SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(db)
        .await
        .context("Failed to delete vendor")
        .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Vendor with id {} not found", id)));
        }

        info!(target: "api", vendor_id = %id, "Vendor deleted");
        Ok(())
    }
}
