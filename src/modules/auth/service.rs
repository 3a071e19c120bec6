use anyhow::anyhow;
use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use opsdesk_auth::{create_session_token, verify_session_token};
use opsdesk_config::{JwtConfig, SessionConfig};
use opsdesk_core::{AppError, FieldErrors, hash_password, verify_dummy_password, verify_password};
use opsdesk_models::{
    ClientContext, CurrentPrincipal, Email, LoginRequest, LoginResponse, NewPrincipal, Principal,
    PrincipalStatus, RegisterRequest, Role, SessionId, UpdateProfileRequest,
};

use crate::metrics::{track_login_failure, track_login_success};
use crate::middleware::auth::session_token;
use crate::middleware::status::INACTIVE_MESSAGE;
use crate::modules::principals::service::{PrincipalService, ProfileChanges};
use crate::modules::sessions::service::SessionService;

pub const CREDENTIALS_MESSAGE: &str = "These credentials do not match our records.";

fn invalid_email() -> AppError {
    AppError::invalid_field("email", "The email must be a valid email address.")
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct AuthService;

impl AuthService {
    /// Registers a password-authenticated `employee`.
    #[instrument(skip(db, dto))]
    pub async fn register(db: &PgPool, dto: RegisterRequest) -> Result<Principal, AppError> {
        let (Some(name), Some(email), Some(password)) =
            (trimmed(dto.name), dto.email, dto.password)
        else {
            return Err(AppError::bad_request(anyhow!("Incomplete registration payload")));
        };

        let principal = PrincipalService::create(
            db,
            NewPrincipal {
                name,
                email: Email::new(&email).map_err(|_| invalid_email())?,
                password_hash: Some(hash_password(&password)?),
                role: Role::Employee,
                status: PrincipalStatus::Active,
                external_identity: None,
            },
        )
        .await?;

        info!(target: "auth", principal_id = %principal.id, "Principal registered");
        Ok(principal)
    }

    /// Password login. Every successful login opens a brand-new session with
    /// its own anti-forgery token.
    #[instrument(skip(db, dto, client, jwt_config))]
    pub async fn login(
        db: &PgPool,
        dto: &LoginRequest,
        client: &ClientContext,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        let email = dto.email.as_deref().unwrap_or_default();
        let password = dto.password.as_deref().unwrap_or_default();

        let principal = match Email::new(email) {
            Ok(email) => PrincipalService::find_by_email(db, &email).await?,
            Err(_) => None,
        };
        let Some(principal) = principal else {
            verify_dummy_password(password);
            return Err(Self::failed_login(email, client, "unknown_email"));
        };
        let Some(hash) = principal.password_hash.as_deref() else {
            verify_dummy_password(password);
            return Err(Self::failed_login(email, client, "no_password"));
        };
        if !verify_password(password, hash)? {
            return Err(Self::failed_login(email, client, "bad_password"));
        }

        if !principal.is_active() {
            warn!(
                target: "security",
                principal_id = %principal.id,
                principal_email = %principal.email,
                principal_status = %principal.status,
                ip = client.ip_address.as_deref(),
                "Login refused for inactive principal"
            );
            track_login_failure("inactive");
            return Err(AppError::forbidden(INACTIVE_MESSAGE));
        }

        let session = SessionService::create(db, principal.id, client).await?;
        let access_token = create_session_token(
            principal.id.into_inner(),
            session.id.into_inner(),
            principal.email.as_str(),
            principal.role.as_str(),
            jwt_config,
        )?;
        PrincipalService::touch_last_login(db, principal.id).await?;

        info!(
            target: "auth",
            principal_id = %principal.id,
            session_id = %session.id,
            ip = client.ip_address.as_deref(),
            user_agent = client.user_agent.as_deref(),
            "Login succeeded"
        );
        track_login_success(principal.role.as_str());

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: jwt_config.access_token_expiry,
            csrf_token: session.csrf_token,
            principal,
        })
    }

    fn failed_login(email: &str, client: &ClientContext, reason: &'static str) -> AppError {
        warn!(
            target: "auth",
            email,
            reason,
            ip = client.ip_address.as_deref(),
            user_agent = client.user_agent.as_deref(),
            "Login failed"
        );
        track_login_failure(reason);
        AppError::invalid_field("email", CREDENTIALS_MESSAGE)
    }

    /// Revokes the session a client presents while logging in again, so the
    /// old token and anti-forgery token die with the rotation.
    pub async fn revoke_presented_session(
        db: &PgPool,
        headers: &HeaderMap,
        jwt_config: &JwtConfig,
        session_config: &SessionConfig,
    ) -> Result<(), AppError> {
        let Ok((token, _)) = session_token(headers, session_config) else {
            return Ok(());
        };
        let Some(session_id) = verify_session_token(&token, jwt_config)
            .ok()
            .and_then(|claims| claims.session_id())
        else {
            return Ok(());
        };

        if SessionService::revoke(db, SessionId::from_uuid(session_id)).await? {
            info!(target: "auth", session_id = %session_id, "Previous session rotated out");
        }
        Ok(())
    }

    #[instrument(skip(db, current), fields(principal.id = %current.id))]
    pub async fn logout(db: &PgPool, current: &CurrentPrincipal) -> Result<(), AppError> {
        SessionService::revoke(db, current.session_id).await?;
        info!(target: "auth", principal_id = %current.id, session_id = %current.session_id, "Logged out");
        Ok(())
    }

    /// Applies profile changes. Changing the password requires the current
    /// one whenever the principal already has a password.
    #[instrument(skip(db, current, dto), fields(principal.id = %current.id))]
    pub async fn update_profile(
        db: &PgPool,
        current: &CurrentPrincipal,
        dto: UpdateProfileRequest,
    ) -> Result<Principal, AppError> {
        let principal = PrincipalService::get(db, current.id).await?;
        let mut errors = FieldErrors::new();

        let email = match trimmed(dto.email) {
            Some(email) => match Email::new(&email) {
                Ok(email) => Some(email),
                Err(_) => {
                    errors.add("email", "The email must be a valid email address.");
                    None
                }
            },
            None => None,
        };

        if dto.password.is_some() {
            if let Some(hash) = principal.password_hash.as_deref() {
                match dto.current_password.as_deref() {
                    None | Some("") => errors.add(
                        "current_password",
                        "The current password field is required when changing the password.",
                    ),
                    Some(current_password) => {
                        if !verify_password(current_password, hash)? {
                            errors.add("current_password", "The current password is incorrect.");
                        }
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }

        let password_hash = dto.password.as_deref().map(hash_password).transpose()?;
        let password_changed = password_hash.is_some();
        let updated = PrincipalService::update_profile(
            db,
            current.id,
            ProfileChanges {
                name: trimmed(dto.name),
                email,
                password_hash,
            },
        )
        .await?;

        if password_changed {
            info!(target: "auth", principal_id = %current.id, "Password changed");
        }
        if updated.email != principal.email {
            info!(target: "auth", principal_id = %current.id, "Email changed");
        }
        Ok(updated)
    }
}
