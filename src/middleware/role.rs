//! Role gate.
//!
//! Every route group declares the roles it admits; an empty set admits any
//! authenticated principal. Passing the gate is itself an audited event.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use opsdesk_core::AppError;
use opsdesk_models::{CurrentPrincipal, Role};

use crate::metrics::track_gate_rejection;
use crate::middleware::caller::RequestContext;

pub const ADMIN: &[Role] = &[Role::Admin];
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Manager];
pub const ANY_ROLE: &[Role] = &[];

/// Whether `role` is admitted by `allowed`.
pub fn role_allowed(role: Role, allowed: &[Role]) -> bool {
    allowed.is_empty() || allowed.contains(&role)
}

fn role_names(roles: &[Role]) -> Vec<&'static str> {
    roles.iter().map(|r| r.as_str()).collect()
}

/// Middleware that checks the current principal's role against `allowed_roles`.
/// Runs behind the authentication gate, which attaches the principal.
///
/// ```rust,ignore
/// use axum::middleware;
/// use crate::middleware::role::{require_roles, MANAGERS};
///
/// let routes = Router::new()
///     .route("/", post(create_customer))
///     .route_layer(middleware::from_fn(|req, next| require_roles(req, next, MANAGERS)));
/// ```
pub async fn require_roles(req: Request, next: Next, allowed_roles: &'static [Role]) -> Response {
    let (parts, body) = req.into_parts();
    let context = RequestContext::from_parts(&parts);
    let required = role_names(allowed_roles);

    let Some(principal) = parts.extensions.get::<CurrentPrincipal>().cloned() else {
        return AppError::unauthorized("route is not behind the authentication gate")
            .into_response();
    };

    if !role_allowed(principal.role, allowed_roles) {
        warn!(
            target: "security",
            principal_id = %principal.id,
            principal_role = %principal.role,
            required_roles = ?required,
            url = %context.url,
            method = %context.method,
            ip = %context.ip,
            "Insufficient privileges"
        );
        track_gate_rejection("role", principal.role.as_str());
        return AppError::insufficient_privileges(&required, principal.role.as_str())
            .into_response();
    }

    info!(
        target: "audit",
        principal_id = %principal.id,
        principal_email = %principal.email,
        principal_role = %principal.role,
        required_roles = ?required,
        url = %context.url,
        method = %context.method,
        ip = %context.ip,
        "Role check passed"
    );

    next.run(Request::from_parts(parts, body)).await
}
