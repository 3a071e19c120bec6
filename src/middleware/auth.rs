//! Authentication gate.
//!
//! A request is authenticated by a session token sent either as
//! `Authorization: Bearer <token>` or in the session cookie. The token's
//! signature and expiry are checked first, then the server-side session and
//! the principal it names. Cookie-authenticated unsafe requests must also echo
//! the session's anti-forgery token in `X-CSRF-Token`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};

use opsdesk_auth::verify_session_token;
use opsdesk_config::{JwtConfig, SessionConfig};
use opsdesk_core::AppError;
use opsdesk_models::{AuthMethod, CurrentPrincipal, PrincipalId, Role, SessionId};

use crate::metrics::track_gate_rejection;
use crate::middleware::caller::RequestContext;
use crate::modules::principals::service::PrincipalService;
use crate::modules::sessions::service::SessionService;
use crate::state::AppState;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Set on responses that passed the authentication gate so outer layers can
/// attribute the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAs(pub PrincipalId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    MalformedHeader,
    InvalidToken,
    UnknownSession,
    RevokedSession,
    SessionMismatch,
    UnknownPrincipal,
    CsrfMismatch,
}

impl AuthRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "missing_token",
            AuthRejection::MalformedHeader => "malformed_authorization_header",
            AuthRejection::InvalidToken => "invalid_token",
            AuthRejection::UnknownSession => "unknown_session",
            AuthRejection::RevokedSession => "revoked_session",
            AuthRejection::SessionMismatch => "session_principal_mismatch",
            AuthRejection::UnknownPrincipal => "unknown_principal",
            AuthRejection::CsrfMismatch => "csrf_token_mismatch",
        }
    }
}

#[derive(Debug)]
pub enum AuthFailure {
    Rejected(AuthRejection),
    /// The store could not be consulted; reported as a fault, not a rejection.
    Fault(AppError),
}

impl From<AppError> for AuthFailure {
    fn from(err: AppError) -> Self {
        AuthFailure::Fault(err)
    }
}

/// Finds the session token, preferring the bearer header over the cookie.
pub fn session_token(
    headers: &HeaderMap,
    session_config: &SessionConfig,
) -> Result<(String, AuthMethod), AuthRejection> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthRejection::MalformedHeader)?;
        return Ok((token.to_string(), AuthMethod::Bearer));
    }

    CookieJar::from_headers(headers)
        .get(&session_config.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|t| !t.is_empty())
        .map(|token| (token, AuthMethod::Cookie))
        .ok_or(AuthRejection::MissingToken)
}

/// Principal id claimed by a correctly signed, unexpired token. The session is
/// not consulted, so this is only fit for attributing log entries.
pub fn claimed_principal_id(
    headers: &HeaderMap,
    jwt_config: &JwtConfig,
    session_config: &SessionConfig,
) -> Option<PrincipalId> {
    let (token, _) = session_token(headers, session_config).ok()?;
    let claims = verify_session_token(&token, jwt_config).ok()?;
    claims.principal_id().map(PrincipalId::from_uuid)
}

fn requires_csrf(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

pub async fn authenticate(
    state: &AppState,
    parts: &Parts,
) -> Result<CurrentPrincipal, AuthFailure> {
    let (token, method) =
        session_token(&parts.headers, &state.session_config).map_err(AuthFailure::Rejected)?;

    let claims = verify_session_token(&token, &state.jwt_config).map_err(|err| {
        debug!(target: "auth", error = %err.error, "Session token rejected");
        AuthFailure::Rejected(AuthRejection::InvalidToken)
    })?;

    let (Some(principal_id), Some(session_id)) = (claims.principal_id(), claims.session_id())
    else {
        return Err(AuthFailure::Rejected(AuthRejection::InvalidToken));
    };
    let principal_id = PrincipalId::from_uuid(principal_id);
    let session_id = SessionId::from_uuid(session_id);

    let session = SessionService::find(&state.db, session_id)
        .await?
        .ok_or(AuthFailure::Rejected(AuthRejection::UnknownSession))?;
    if !session.is_live() {
        return Err(AuthFailure::Rejected(AuthRejection::RevokedSession));
    }
    if !session.is_usable_by(principal_id) {
        return Err(AuthFailure::Rejected(AuthRejection::SessionMismatch));
    }

    let principal = PrincipalService::find_by_id(&state.db, principal_id)
        .await?
        .ok_or(AuthFailure::Rejected(AuthRejection::UnknownPrincipal))?;

    if method == AuthMethod::Cookie && requires_csrf(&parts.method) {
        let presented = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented.is_empty() || presented != session.csrf_token {
            return Err(AuthFailure::Rejected(AuthRejection::CsrfMismatch));
        }
    }

    Ok(CurrentPrincipal::from_principal(&principal, session_id, method))
}

/// Logs and answers an unauthenticated request. Browser callers are turned
/// into a redirect to `/login` by the error reporter.
fn reject_unauthenticated(
    context: &RequestContext,
    reason: AuthRejection,
    required_roles: &[Role],
) -> Response {
    warn!(
        target: "security",
        ip = %context.ip,
        user_agent = %context.user_agent,
        url = %context.url,
        method = %context.method,
        reason = reason.as_str(),
        required_roles = ?required_roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "Unauthenticated request rejected"
    );
    track_gate_rejection("authentication", reason.as_str());
    AppError::unauthorized(reason.as_str()).into_response()
}

/// Authentication gate. `allowed_roles` is the role set of the route group,
/// recorded on rejection so the security log shows what was being guarded.
pub async fn require_auth(
    State((state, allowed_roles)): State<(AppState, &'static [Role])>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    match authenticate(&state, &parts).await {
        Ok(principal) => {
            let principal_id = principal.id;
            parts.extensions.insert(principal);
            let mut response = next.run(Request::from_parts(parts, body)).await;
            response
                .extensions_mut()
                .insert(AuthenticatedAs(principal_id));
            response
        }
        Err(AuthFailure::Rejected(reason)) => {
            reject_unauthenticated(&RequestContext::from_parts(&parts), reason, allowed_roles)
        }
        Err(AuthFailure::Fault(err)) => err.into_response(),
    }
}

/// The principal attached by [`require_auth`]. Handlers behind the gate
/// pipeline take this instead of reading the token themselves.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub CurrentPrincipal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPrincipal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(|| AppError::unauthorized("route is not behind the authentication gate"))
    }
}

pub fn session_cookie(session_config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((session_config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(session_config.cookie_secure)
        .same_site(SameSite::Lax)
        .build()
}

/// A jar that tells the client to drop its session cookie.
pub fn clear_session_cookie(session_config: &SessionConfig) -> CookieJar {
    let mut cookie = Cookie::build((session_config.cookie_name.clone(), ""))
        .path("/")
        .build();
    cookie.make_removal();
    // `CookieJar::remove` only emits a removal for cookies it was built from.
    CookieJar::new().add(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn session_config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("opsdesk_session=from-cookie"),
        );
        assert_eq!(
            session_token(&headers, &session_config()),
            Ok(("abc".to_string(), AuthMethod::Bearer))
        );
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; opsdesk_session=from-cookie"),
        );
        assert_eq!(
            session_token(&headers, &session_config()),
            Ok(("from-cookie".to_string(), AuthMethod::Cookie))
        );
    }

    #[test]
    fn test_missing_and_malformed_credentials() {
        let headers = HeaderMap::new();
        assert_eq!(
            session_token(&headers, &session_config()),
            Err(AuthRejection::MissingToken)
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(
            session_token(&headers, &session_config()),
            Err(AuthRejection::MalformedHeader)
        );
    }

    #[test]
    fn test_csrf_only_for_unsafe_methods() {
        assert!(!requires_csrf(&Method::GET));
        assert!(!requires_csrf(&Method::HEAD));
        assert!(!requires_csrf(&Method::OPTIONS));
        assert!(requires_csrf(&Method::POST));
        assert!(requires_csrf(&Method::DELETE));
    }

    #[test]
    fn test_claimed_principal_requires_valid_signature() {
        let jwt_config = JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
        };
        let principal_id = uuid::Uuid::new_v4();
        let token = opsdesk_auth::create_session_token(
            principal_id,
            uuid::Uuid::new_v4(),
            "ada@example.com",
            "admin",
            &jwt_config,
        )
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(
            claimed_principal_id(&headers, &jwt_config, &session_config()),
            Some(PrincipalId::from_uuid(principal_id))
        );

        let other = JwtConfig {
            secret: "other-secret".to_string(),
            access_token_expiry: 3600,
        };
        assert_eq!(claimed_principal_id(&headers, &other, &session_config()), None);
    }

    #[test]
    fn test_clear_session_cookie_expires_it() {
        let response = (clear_session_cookie(&session_config()), "").into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("opsdesk_session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
