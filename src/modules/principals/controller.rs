use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{instrument, warn};

use opsdesk_core::AppError;
use opsdesk_models::{
    CurrentPrincipal, PaginatedPrincipalsResponse, Principal, PrincipalFilterParams, PrincipalId,
    PrincipalStatus, Role, UpdateRoleRequest, UpdateStatusRequest,
};

use crate::docs::{ErrorResponse, ValidationErrorResponse};
use crate::metrics::track_sessions_revoked;
use crate::middleware::auth::AuthPrincipal;
use crate::modules::principals::service::PrincipalService;
use crate::modules::sessions::service::SessionService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Admins may not lock themselves out through the admin API.
fn refuse_self(
    actor: &CurrentPrincipal,
    target: PrincipalId,
    action: &str,
) -> Result<(), AppError> {
    if actor.id == target {
        warn!(
            target: "security",
            principal_id = %actor.id,
            action,
            "Refused admin action on own account"
        );
        return Err(AppError::forbidden(format!(
            "You cannot {} your own account.",
            action
        )));
    }
    Ok(())
}

/// List principals
#[utoipa::path(
    get,
    path = "/api/principals",
    params(
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Match name or email"),
        ("page" = Option<i64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default 15, max 100)")
    ),
    responses(
        (status = 200, description = "Paginated principals", body = PaginatedPrincipalsResponse),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
#[instrument(skip(state))]
pub async fn list_principals(
    State(state): State<AppState>,
    Query(filters): Query<PrincipalFilterParams>,
) -> Result<Json<PaginatedPrincipalsResponse>, AppError> {
    let principals = PrincipalService::list(&state.db, filters).await?;
    Ok(Json(principals))
}

/// Activate or deactivate a principal
///
/// Deactivation revokes every live session of the principal.
#[utoipa::path(
    patch,
    path = "/api/principals/{id}/status",
    params(("id" = uuid::Uuid, Path, description = "Principal ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Principal),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 404, description = "Principal not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
#[instrument(skip(state, actor, dto))]
pub async fn update_principal_status(
    State(state): State<AppState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<PrincipalId>,
    ValidatedJson(dto): ValidatedJson<UpdateStatusRequest>,
) -> Result<Json<Principal>, AppError> {
    let status = dto
        .status
        .as_deref()
        .and_then(PrincipalStatus::parse)
        .ok_or_else(|| AppError::invalid_field("status", "The selected status is invalid."))?;
    if status != PrincipalStatus::Active {
        refuse_self(&actor, id, "deactivate")?;
    }

    let principal = PrincipalService::update_status(&state.db, id, status).await?;

    if status != PrincipalStatus::Active {
        let revoked = SessionService::revoke_all_for_principal(&state.db, id).await?;
        track_sessions_revoked("deactivation", revoked);
        warn!(
            target: "security",
            principal_id = %id,
            actor_id = %actor.id,
            sessions_revoked = revoked,
            "Principal deactivated"
        );
    }
    warn!(
        target: "audit",
        principal_id = %id,
        actor_id = %actor.id,
        status = %status,
        "Principal status changed"
    );

    Ok(Json(principal))
}

/// Change a principal's role
#[utoipa::path(
    patch,
    path = "/api/principals/{id}/role",
    params(("id" = uuid::Uuid, Path, description = "Principal ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Principal),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 404, description = "Principal not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
#[instrument(skip(state, actor, dto))]
pub async fn update_principal_role(
    State(state): State<AppState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<PrincipalId>,
    ValidatedJson(dto): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<Principal>, AppError> {
    let role = dto
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| AppError::invalid_field("role", "The selected role is invalid."))?;
    if role != Role::Admin {
        refuse_self(&actor, id, "demote")?;
    }

    let principal = PrincipalService::update_role(&state.db, id, role).await?;
    warn!(
        target: "audit",
        principal_id = %id,
        actor_id = %actor.id,
        role = %role,
        "Principal role changed"
    );

    Ok(Json(principal))
}

/// Close a principal's account
#[utoipa::path(
    delete,
    path = "/api/principals/{id}",
    params(("id" = uuid::Uuid, Path, description = "Principal ID")),
    responses(
        (status = 204, description = "Account closed"),
        (status = 403, description = "Insufficient privileges", body = ErrorResponse),
        (status = 404, description = "Principal not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
#[instrument(skip(state, actor))]
pub async fn delete_principal(
    State(state): State<AppState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<PrincipalId>,
) -> Result<StatusCode, AppError> {
    refuse_self(&actor, id, "close")?;

    PrincipalService::soft_delete(&state.db, id).await?;
    let revoked = SessionService::revoke_all_for_principal(&state.db, id).await?;
    track_sessions_revoked("account_closed", revoked);
    warn!(
        target: "audit",
        principal_id = %id,
        actor_id = %actor.id,
        sessions_revoked = revoked,
        "Principal account closed"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_models::{AuthMethod, Email, SessionId};

    fn admin() -> CurrentPrincipal {
        CurrentPrincipal {
            id: PrincipalId::new(),
            name: "Root".to_string(),
            email: Email::new_unchecked("root@example.com"),
            role: Role::Admin,
            status: PrincipalStatus::Active,
            session_id: SessionId::new(),
            method: AuthMethod::Bearer,
        }
    }

    #[test]
    fn test_refuse_self_blocks_own_account() {
        let actor = admin();
        let err = refuse_self(&actor, actor.id, "close").unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.public_message(), "You cannot close your own account.");
    }

    #[test]
    fn test_refuse_self_allows_other_accounts() {
        assert!(refuse_self(&admin(), PrincipalId::new(), "close").is_ok());
    }
}

