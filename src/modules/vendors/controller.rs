use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use opsdesk_core::AppError;
use opsdesk_models::{
    Vendor, VendorFilterParams, VendorId, VendorPayload, PaginatedVendorsResponse,
};

use crate::docs::{ErrorResponse, ValidationErrorResponse};
use crate::middleware::auth::AuthPrincipal;
use crate::modules::vendors::service::VendorService;
use crate::state::AppState;
use crate::validation::validate_entity;
use crate::validator::JsonPayload;

/// List vendors
#[utoipa::path(
    get,
    path = "/api/vendors",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("service_category" = Option<String>, Query, description = "Filter by service category"),
        ("search" = Option<String>, Query, description = "Match name, code, email or tax id"),
        ("page" = Option<i64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default 15, max 100)")
    ),
    responses(
        (status = 200, description = "Paginated vendors", body = PaginatedVendorsResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Vendors"
)]
#[instrument(skip(state))]
pub async fn list_vendors(
    State(state): State<AppState>,
    Query(filters): Query<VendorFilterParams>,
) -> Result<Json<PaginatedVendorsResponse>, AppError> {
    let vendors = VendorService::list(&state.db, filters).await?;
    Ok(Json(vendors))
}

/// Get a vendor
#[utoipa::path(
    get,
    path = "/api/vendors/{id}",
    params(("id" = uuid::Uuid, Path, description = "Vendor ID")),
    responses(
        (status = 200, description = "Vendor", body = Vendor),
        (status = 404, description = "Vendor not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Vendors"
)]
#[instrument(skip(state))]
pub async fn get_vendor(
    State(state): State<AppState>,
    Path(id): Path<VendorId>,
) -> Result<Json<Vendor>, AppError> {
    let vendor = VendorService::get(&state.db, id).await?;
    Ok(Json(vendor))
}

/// Create a vendor
#[utoipa::path(
    post,
    path = "/api/vendors",
    request_body = VendorPayload,
    responses(
        (status = 201, description = "Vendor created", body = Vendor),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 409, description = "No unique code could be allocated; retry", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Vendors"
)]
#[instrument(skip(state, principal, payload))]
pub async fn create_vendor(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonPayload(payload): JsonPayload<VendorPayload>,
) -> Result<(StatusCode, Json<Vendor>), AppError> {
    let input = validate_entity(&state.db, payload, None).await?;
    let vendor = VendorService::create(&state.db, input, principal.id).await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

/// Replace a vendor
#[utoipa::path(
    put,
    path = "/api/vendors/{id}",
    params(("id" = uuid::Uuid, Path, description = "Vendor ID")),
    request_body = VendorPayload,
    responses(
        (status = 200, description = "Vendor updated", body = Vendor),
        (status = 404, description = "Vendor not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Vendors"
)]
#[instrument(skip(state, principal, payload))]
pub async fn update_vendor(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<VendorId>,
    JsonPayload(payload): JsonPayload<VendorPayload>,
) -> Result<Json<Vendor>, AppError> {
    VendorService::get(&state.db, id).await?;
    let input = validate_entity(&state.db, payload, Some(id.into_inner())).await?;
    let vendor = VendorService::update(&state.db, id, input, principal.id).await?;
    Ok(Json(vendor))
}

/// Delete a vendor
#[utoipa::path(
    delete,
    path = "/api/vendors/{id}",
    params(("id" = uuid::Uuid, Path, description = "Vendor ID")),
    responses(
        (status = 204, description = "Vendor deleted"),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 404, description = "Vendor not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Vendors"
)]
#[instrument(skip(state))]
pub async fn delete_vendor(
    State(state): State<AppState>,
    Path(id): Path<VendorId>,
) -> Result<StatusCode, AppError> {
    VendorService::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
