use anyhow::{Context, anyhow};
use sqlx::{PgPool, types::Json};
use tracing::{info, instrument};

use opsdesk_core::{AppError, PaginationMeta};
use opsdesk_models::{
    CUSTOMER_CODE_PREFIX, Customer, CustomerFilterParams, CustomerId, CustomerInput,
    PaginatedCustomersResponse, PrincipalId,
};

use crate::metrics::track_entity_created;
use crate::utils::codes::{insert_with_unique_code, unique_field_error};

const TABLE: &str = "customers";

const CUSTOMER_COLUMNS: &str = "id, customer_code, name, customer_type, industry, status, priority, \
    email, phone, mobile, website, address_line1, address_line2, city, state, postal_code, country, \
    credit_limit, outstanding_balance, payment_terms, currency, first_contact_date, \
    last_contact_date, contract_start_date, contract_end_date, tags, notes, account_manager_id, \
    additional_contacts, created_by, created_at, updated_at, deleted_at";

fn log_financial_terms(action: &str, customer: &Customer, actor: PrincipalId) {
    let credit_limit = customer
        .credit_limit
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "none".to_string());
    info!(
        target: "financial",
        action,
        customer_id = %customer.id,
        customer_code = %customer.customer_code,
        credit_limit = %credit_limit,
        outstanding_balance = %customer.outstanding_balance,
        currency = %customer.currency,
        actor_id = %actor,
        "Customer financial terms recorded"
    );
}

pub struct CustomerService;

impl CustomerService {
    /// Inserts a validated customer under a freshly generated `CUST` code.
    #[instrument(skip(db, input))]
    pub async fn create(
        db: &PgPool,
        input: CustomerInput,
        created_by: PrincipalId,
    ) -> Result<Customer, AppError> {
        let sql = format!(
            "INSERT INTO customers (customer_code, name, customer_type, industry, status, priority, \
             email, phone, mobile, website, address_line1, address_line2, city, state, postal_code, \
             country, credit_limit, outstanding_balance, payment_terms, currency, first_contact_date, \
             last_contact_date, contract_start_date, contract_end_date, tags, notes, \
             account_manager_id, additional_contacts, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29) \
             RETURNING {}",
            CUSTOMER_COLUMNS
        );
        let sql = sql.as_str();
        let input = &input;

        let customer = insert_with_unique_code(
            db,
            TABLE,
            "customer_code",
            CUSTOMER_CODE_PREFIX,
            |code| async move {
                sqlx::query_as::<_, Customer>(sql)
                    .bind(code)
                    .bind(&input.name)
                    .bind(input.customer_type)
                    .bind(&input.industry)
                    .bind(input.status)
                    .bind(input.priority)
                    .bind(&input.email)
                    .bind(&input.phone)
                    .bind(&input.mobile)
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

        info!(target: "api", customer_id = %customer.id, customer_code = %customer.customer_code, "Customer created");
        log_financial_terms("created", &customer, created_by);
        track_entity_created(TABLE);
        Ok(customer)
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: CustomerFilterParams,
    ) -> Result<PaginatedCustomersResponse, AppError> {
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
        if let Some(search) = &filters.search {
            params.push(format!("%{}%", search));
            where_clause.push_str(&format!(
                " AND (name ILIKE ${0} OR customer_code ILIKE ${0} OR email ILIKE ${0})",
                params.len()
            ));
        }

        let count_query = format!("SELECT COUNT(*) FROM customers{}", where_clause);
        let mut count_sql = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_sql = count_sql.bind(param);
        }
        let total = count_sql
            .fetch_one(db)
            .await
            .context("Failed to count customers")
            .map_err(AppError::database)?;

        let data_query = format!(
            "SELECT {} FROM customers{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            CUSTOMER_COLUMNS,
            where_clause,
            filters.pagination.per_page(),
            filters.pagination.offset()
        );
        let mut data_sql = sqlx::query_as::<_, Customer>(&data_query);
        for param in params {
            data_sql = data_sql.bind(param);
        }
        let data = data_sql
            .fetch_all(db)
            .await
            .context("Failed to fetch customers")
            .map_err(AppError::database)?;

        Ok(PaginatedCustomersResponse {
            data,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    pub async fn get(db: &PgPool, id: CustomerId) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE id = $1 AND deleted_at IS NULL",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("Failed to fetch customer by ID")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found(anyhow!("Customer with id {} not found", id)))
    }

    /// Replaces every editable field. The code and creator never change.
    #[instrument(skip(db, input))]
    pub async fn update(
        db: &PgPool,
        id: CustomerId,
        input: CustomerInput,
        actor: PrincipalId,
    ) -> Result<Customer, AppError> {
        let before = Self::get(db, id).await?;

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers SET name = $2, customer_type = $3, industry = $4, status = $5, \
             priority = $6, email = $7, phone = $8, mobile = $9, website = $10, \
             address_line1 = $11, address_line2 = $12, city = $13, state = $14, \
             postal_code = $15, country = $16, credit_limit = $17, outstanding_balance = $18, \
             payment_terms = $19, currency = $20, first_contact_date = $21, \
             last_contact_date = $22, contract_start_date = $23, contract_end_date = $24, \
             tags = $25, notes = $26, account_manager_id = $27, additional_contacts = $28, \
             updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.customer_type)
        .bind(&input.industry)
        .bind(input.status)
        .bind(input.priority)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.mobile)
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
                AppError::database(anyhow::Error::new(e).context("Failed to update customer"))
            })
        })?
        .ok_or_else(|| AppError::not_found(anyhow!("Customer with id {} not found", id)))?;

        info!(target: "api", customer_id = %customer.id, "Customer updated");
        if before.credit_limit != customer.credit_limit
            || before.outstanding_balance != customer.outstanding_balance
            || before.currency != customer.currency
        {
            log_financial_terms("updated", &customer, actor);
        }
        Ok(customer)
    }

    /// Soft-deletes a customer; its code and email stay reserved.
    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, id: CustomerId) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE customers SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(db)
        .await
        .context("Failed to delete customer")
        .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Customer with id {} not found", id)));
        }

        info!(target: "api", customer_id = %id, "Customer deleted");
        Ok(())
    }
}
