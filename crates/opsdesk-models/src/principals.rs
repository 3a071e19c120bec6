//! Principal (account) models and DTOs.
//!
//! A principal authenticates with a password, with a linked external identity,
//! or both. It is never hard-deleted: closing an account sets `deleted_at`,
//! after which the principal can no longer authenticate.

use chrono::{DateTime, Utc};
use opsdesk_core::field_errors::FIELD_PARAM;
use opsdesk_core::serde::empty_string_as_none;
use opsdesk_core::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::enums::define_pg_enum;
use crate::ids::{PrincipalId, SessionId};
use crate::value_types::Email;

define_pg_enum!(
    /// Coarse authorization level checked by the role gate.
    Role as "principal_role" {
        Admin => "admin",
        Manager => "manager",
        Employee => "employee",
    }
);

define_pg_enum!(
    PrincipalStatus as "principal_status" {
        Active => "active",
        Inactive => "inactive",
    }
);

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    pub email: Email,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: PrincipalStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active && self.deleted_at.is_none()
    }
}

/// An identity asserted by an outside provider and linked to a principal.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ExternalIdentity {
    pub id: Uuid,
    pub principal_id: PrincipalId,
    pub provider: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("A principal without a password must have a linked external identity")]
    NoCredential,
    #[error("External identity provider and subject must not be empty")]
    IncompleteIdentity,
}

/// Everything needed to insert a principal.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub name: String,
    pub email: Email,
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: PrincipalStatus,
    /// `(provider, subject)` linked in the same transaction.
    pub external_identity: Option<(String, String)>,
}

impl NewPrincipal {
    /// Enforces that the principal can authenticate somehow.
    pub fn check_credentials(&self) -> Result<(), CredentialError> {
        if let Some((provider, subject)) = &self.external_identity {
            if provider.trim().is_empty() || subject.trim().is_empty() {
                return Err(CredentialError::IncompleteIdentity);
            }
        }
        if self.password_hash.is_none() && self.external_identity.is_none() {
            return Err(CredentialError::NoCredential);
        }
        Ok(())
    }
}

/// How the current request proved its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    Cookie,
}

/// The authenticated caller, attached to the request by the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPrincipal {
    pub id: PrincipalId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub status: PrincipalStatus,
    pub session_id: SessionId,
    pub method: AuthMethod,
}

impl CurrentPrincipal {
    pub fn from_principal(
        principal: &Principal,
        session_id: SessionId,
        method: AuthMethod,
    ) -> Self {
        Self {
            id: principal.id,
            name: principal.name.clone(),
            email: principal.email.clone(),
            role: principal.role,
            status: principal.status,
            session_id,
            method,
        }
    }
}

fn check_role(value: &str) -> Result<(), ValidationError> {
    Role::check_member(value)
}

fn check_status(value: &str) -> Result<(), ValidationError> {
    PrincipalStatus::check_member(value)
}

/// `password` must be repeated in `password_confirmation` whenever it is sent.
fn password_confirmed(
    password: Option<&str>,
    confirmation: Option<&str>,
) -> Result<(), ValidationError> {
    match password {
        Some(password) if confirmation != Some(password) => {
            let mut err = ValidationError::new("confirmed");
            err.add_param(FIELD_PARAM.into(), &"password");
            Err(err)
        }
        _ => Ok(()),
    }
}

fn check_register_confirmation(req: &RegisterRequest) -> Result<(), ValidationError> {
    password_confirmed(req.password.as_deref(), req.password_confirmation.as_deref())
}

fn check_profile_confirmation(req: &UpdateProfileRequest) -> Result<(), ValidationError> {
    password_confirmed(req.password.as_deref(), req.password_confirmation.as_deref())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "check_register_confirmation", skip_on_field_errors = false))]
pub struct RegisterRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(required, length(min = 8, max = 255))]
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    /// Must be echoed in `X-CSRF-Token` on unsafe requests authenticated by cookie.
    pub csrf_token: String,
    pub principal: Principal,
}

/// Profile changes for the current principal; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "check_profile_confirmation", skip_on_field_errors = false))]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(min = 8, max = 255))]
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    #[validate(required, custom(function = "check_status"))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(required, custom(function = "check_role"))]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PrincipalFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<String>,
    /// Matches name or email.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedPrincipalsResponse {
    pub data: Vec<Principal>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_core::FieldErrors;

    fn new_principal() -> NewPrincipal {
        NewPrincipal {
            name: "Ada".to_string(),
            email: Email::new("ada@example.com").unwrap(),
            password_hash: None,
            role: Role::Employee,
            status: PrincipalStatus::Active,
            external_identity: None,
        }
    }

    #[test]
    fn test_principal_needs_password_or_identity() {
        let mut principal = new_principal();
        assert_eq!(
            principal.check_credentials(),
            Err(CredentialError::NoCredential)
        );

        principal.external_identity = Some(("google".to_string(), "1234".to_string()));
        assert!(principal.check_credentials().is_ok());

        principal.external_identity = None;
        principal.password_hash = Some("$2b$04$hash".to_string());
        assert!(principal.check_credentials().is_ok());
    }

    #[test]
    fn test_blank_identity_is_rejected() {
        let mut principal = new_principal();
        principal.external_identity = Some(("github".to_string(), " ".to_string()));
        assert_eq!(
            principal.check_credentials(),
            Err(CredentialError::IncompleteIdentity)
        );
    }

    #[test]
    fn test_role_round_trips_as_lowercase() {
        assert_eq!(Role::parse("manager"), Some(Role::Manager));
        assert_eq!(Role::parse("Manager"), None);
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert!(Role::check_member("owner").is_err());
    }

    #[test]
    fn test_register_password_confirmation() {
        let request = RegisterRequest {
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            password: Some("password123".to_string()),
            password_confirmation: Some("password124".to_string()),
        };
        let errors = FieldErrors::from_validation(&request.validate().unwrap_err());
        assert_eq!(
            errors.get("password").unwrap(),
            ["The password confirmation does not match."]
        );
    }

    #[test]
    fn test_profile_confirmation_only_when_changing_password() {
        let rename = UpdateProfileRequest {
            name: Some("Ada L.".to_string()),
            ..Default::default()
        };
        assert!(rename.validate().is_ok());

        let missing = UpdateProfileRequest {
            password: Some("brand-new-password".to_string()),
            ..Default::default()
        };
        let errors = FieldErrors::from_validation(&missing.validate().unwrap_err());
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["password"]);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let principal = Principal {
            id: PrincipalId::new(),
            name: "Ada".to_string(),
            email: Email::new("ada@example.com").unwrap(),
            password_hash: Some("secret-hash".to_string()),
            role: Role::Admin,
            status: PrincipalStatus::Active,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_string(&principal).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("deleted_at"));
    }
}
