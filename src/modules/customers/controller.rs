use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use opsdesk_core::AppError;
use opsdesk_models::{
    Customer, CustomerFilterParams, CustomerId, CustomerPayload, PaginatedCustomersResponse,
};

use crate::docs::{ErrorResponse, ValidationErrorResponse};
use crate::middleware::auth::AuthPrincipal;
use crate::modules::customers::service::CustomerService;
use crate::state::AppState;
use crate::validation::validate_entity;
use crate::validator::JsonPayload;

/// List customers
#[utoipa::path(
    get,
    path = "/api/customers",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("search" = Option<String>, Query, description = "Match name, code or email"),
        ("page" = Option<i64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default 15, max 100)")
    ),
    responses(
        (status = 200, description = "Paginated customers", body = PaginatedCustomersResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
#[instrument(skip(state))]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(filters): Query<CustomerFilterParams>,
) -> Result<Json<PaginatedCustomersResponse>, AppError> {
    let customers = CustomerService::list(&state.db, filters).await?;
    Ok(Json(customers))
}

/// Get a customer
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = uuid::Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer", body = Customer),
        (status = 404, description = "Customer not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
#[instrument(skip(state))]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, AppError> {
    let customer = CustomerService::get(&state.db, id).await?;
    Ok(Json(customer))
}

/// Create a customer
#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CustomerPayload,
    responses(
        (status = 201, description = "Customer created", body = Customer),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 409, description = "No unique code could be allocated; retry", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
#[instrument(skip(state, principal, payload))]
pub async fn create_customer(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonPayload(payload): JsonPayload<CustomerPayload>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let input = validate_entity(&state.db, payload, None).await?;
    let customer = CustomerService::create(&state.db, input, principal.id).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Replace a customer
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = uuid::Uuid, Path, description = "Customer ID")),
    request_body = CustomerPayload,
    responses(
        (status = 200, description = "Customer updated", body = Customer),
        (status = 404, description = "Customer not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
#[instrument(skip(state, principal, payload))]
pub async fn update_customer(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<CustomerId>,
    JsonPayload(payload): JsonPayload<CustomerPayload>,
) -> Result<Json<Customer>, AppError> {
    CustomerService::get(&state.db, id).await?;
    let input = validate_entity(&state.db, payload, Some(id.into_inner())).await?;
    let customer = CustomerService::update(&state.db, id, input, principal.id).await?;
    Ok(Json(customer))
}

/// Delete a customer
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = uuid::Uuid, Path, description = "Customer ID")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 404, description = "Customer not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
#[instrument(skip(state))]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode, AppError> {
    CustomerService::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
