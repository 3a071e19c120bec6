//! Status gate: only `active` principals get past this point.
//!
//! An inactive principal's session is terminated on the spot, so a repeat of
//! the same request is rejected by the authentication gate instead.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

use opsdesk_core::AppError;
use opsdesk_models::{CurrentPrincipal, PrincipalStatus};

use crate::metrics::{track_gate_rejection, track_sessions_revoked};
use crate::middleware::auth::clear_session_cookie;
use crate::middleware::caller::RequestContext;
use crate::modules::sessions::service::SessionService;
use crate::state::AppState;

pub const INACTIVE_MESSAGE: &str = "Your account is inactive. Please contact administrator.";

/// `/login?error=...` with the message form-encoded.
pub fn login_redirect_target(message: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", message)
        .finish();
    format!("/login?{}", query)
}

pub async fn require_active(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let context = RequestContext::from_parts(&parts);

    let Some(principal) = parts.extensions.get::<CurrentPrincipal>().cloned() else {
        return AppError::unauthorized("route is not behind the authentication gate")
            .into_response();
    };

    if principal.status == PrincipalStatus::Active {
        return next.run(Request::from_parts(parts, body)).await;
    }

    warn!(
        target: "security",
        principal_id = %principal.id,
        principal_email = %principal.email,
        principal_status = %principal.status,
        ip = %context.ip,
        url = %context.url,
        "Inactive principal rejected, session terminated"
    );
    track_gate_rejection("status", principal.status.as_str());

    if let Err(err) = SessionService::revoke(&state.db, principal.session_id).await {
        return err.into_response();
    }
    track_sessions_revoked("inactive", 1);

    let jar = clear_session_cookie(&state.session_config);
    if context.caller.is_browser() {
        (jar, Redirect::to(&login_redirect_target(INACTIVE_MESSAGE))).into_response()
    } else {
        (jar, AppError::forbidden(INACTIVE_MESSAGE)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_target_encodes_message() {
        assert_eq!(
            login_redirect_target(INACTIVE_MESSAGE),
            "/login?error=Your+account+is+inactive.+Please+contact+administrator."
        );
    }
}
