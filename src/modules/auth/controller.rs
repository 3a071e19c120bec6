use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;
use validator::Validate;

use opsdesk_core::AppError;
use opsdesk_models::{
    ClientContext, LoginRequest, LoginResponse, Principal, RegisterRequest, UpdateProfileRequest,
};

use super::model::MessageResponse;
use super::service::{AuthService, CREDENTIALS_MESSAGE};
use crate::docs::{ErrorResponse, ValidationErrorResponse};
use crate::middleware::auth::{AuthPrincipal, clear_session_cookie, session_cookie};
use crate::middleware::caller::RequestContext;
use crate::middleware::status::login_redirect_target;
use crate::modules::principals::service::PrincipalService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

fn client_context(context: &RequestContext) -> ClientContext {
    ClientContext {
        ip_address: Some(context.ip.clone()).filter(|ip| ip != "unknown"),
        user_agent: Some(context.user_agent.clone()).filter(|ua| ua != "unknown"),
    }
}

/// Register a new employee account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered", body = Principal),
        (status = 422, description = "Validation failed or email already taken", body = ValidationErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Principal>), AppError> {
    let principal = AuthService::register(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(principal)))
}

/// Log in with email and password
///
/// Opens a new session, returns its token and anti-forgery token and sets the
/// session cookie. Any session the client presented is revoked.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 403, description = "Account inactive", body = ErrorResponse),
        (status = 422, description = "Invalid credentials", body = ValidationErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, headers, context, dto))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    context: RequestContext,
    jar: CookieJar,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    AuthService::revoke_presented_session(
        &state.db,
        &headers,
        &state.jwt_config,
        &state.session_config,
    )
    .await?;

    let response =
        AuthService::login(&state.db, &dto, &client_context(&context), &state.jwt_config).await?;
    let jar = jar.add(session_cookie(
        &state.session_config,
        response.access_token.clone(),
    ));
    Ok((jar, Json(response)))
}

/// Form login for the browser landing page. Failures go back to `/login`
/// with the message; success lands on the current principal.
#[instrument(skip(state, headers, context, dto))]
pub async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    context: RequestContext,
    jar: CookieJar,
    Form(dto): Form<LoginRequest>,
) -> Result<Response, AppError> {
    if dto.validate().is_err() {
        return Ok(Redirect::to(&login_redirect_target(CREDENTIALS_MESSAGE)).into_response());
    }

    AuthService::revoke_presented_session(
        &state.db,
        &headers,
        &state.jwt_config,
        &state.session_config,
    )
    .await?;

    match AuthService::login(&state.db, &dto, &client_context(&context), &state.jwt_config).await {
        Ok(response) => {
            let jar = jar.add(session_cookie(&state.session_config, response.access_token));
            Ok((jar, Redirect::to("/api/auth/me")).into_response())
        }
        Err(err) if err.status.is_client_error() => {
            let message = match err.field_errors() {
                Some(_) => CREDENTIALS_MESSAGE.to_string(),
                None => err.public_message(),
            };
            Ok(Redirect::to(&login_redirect_target(&message)).into_response())
        }
        Err(err) => Err(err),
    }
}

/// Log out of the current session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, principal))]
pub async fn logout(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    AuthService::logout(&state.db, &principal).await?;
    Ok((
        clear_session_cookie(&state.session_config),
        Json(MessageResponse {
            message: "Logged out.".to_string(),
        }),
    ))
}

/// Get the current principal
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current principal", body = Principal),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, principal))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Principal>, AppError> {
    let principal = PrincipalService::get(&state.db, principal.id).await?;
    Ok(Json(principal))
}

/// Update the current principal's profile
#[utoipa::path(
    put,
    path = "/api/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Principal),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, principal, dto))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(dto): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<Principal>, AppError> {
    let updated = AuthService::update_profile(&state.db, &principal, dto).await?;
    Ok(Json(updated))
}
