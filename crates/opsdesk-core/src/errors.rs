use std::any::type_name;
use std::panic::Location;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::channels::LogChannel;
use crate::field_errors::FieldErrors;

/// Source type recorded for errors built from a caught panic.
pub const PANIC_SOURCE: &str = "panic";

/// Source type recorded for store failures whose concrete type was erased by `context`.
pub const DATABASE_SOURCE: &str = "Database";

const FATAL_SHAPES: [&str; 3] = ["ParseError", "TypeError", "FatalError"];

/// Error taxonomy used to pick a log channel and a response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Validation,
    NotFound,
    RouteNotFound,
    Conflict,
    Unclassified,
}

impl ErrorKind {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ErrorKind::Authentication,
            StatusCode::FORBIDDEN => ErrorKind::Authorization,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
            _ => ErrorKind::Unclassified,
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub error: Error,
    /// Extra top-level fields merged into the JSON body.
    pub details: Map<String, Value>,
    /// Type name of the error this was built from.
    pub source_type: &'static str,
    pub location: &'static Location<'static>,
}

impl AppError {
    #[track_caller]
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            kind: ErrorKind::from_status(status),
            error: err.into(),
            details: Map::new(),
            source_type: type_name::<E>(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    #[track_caller]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::internal(anyhow!(message.into()))
    }

    /// A store failure. Always reported on the database channel.
    #[track_caller]
    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        let mut err = Self::new(StatusCode::INTERNAL_SERVER_ERROR, err);
        if classify_source(err.source_type, err.status) != LogChannel::Database {
            err.source_type = DATABASE_SOURCE;
        }
        err
    }

    #[track_caller]
    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    #[track_caller]
    pub fn route_not_found(path: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, anyhow!("No route for {}", path))
            .with_kind(ErrorKind::RouteNotFound)
    }

    #[track_caller]
    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    /// Missing or invalid credentials. `reason` is logged, never returned.
    #[track_caller]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow!(reason.into()))
    }

    #[track_caller]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, anyhow!(message.into()))
    }

    #[track_caller]
    pub fn insufficient_privileges(required_roles: &[&str], user_role: &str) -> Self {
        Self::forbidden("Insufficient privileges.")
            .with_detail("required_roles", json!(required_roles))
            .with_detail("user_role", json!(user_role))
    }

    #[track_caller]
    pub fn validation(errors: FieldErrors) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            anyhow!("Validation failed on {} field(s)", errors.len()),
        )
        .with_detail("errors", json!(errors))
    }

    /// Single-field validation failure, e.g. for a body that could not be decoded.
    #[track_caller]
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::validation(errors)
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(StatusCode::CONFLICT, anyhow!(message.into()))
            .with_detail("retryable", Value::Bool(retryable))
    }

    /// Builds the fault reported for a panic caught while handling a request.
    #[track_caller]
    pub fn panic(message: impl Into<String>) -> Self {
        let mut err = Self::internal(anyhow!("panic: {}", message.into()));
        err.source_type = PANIC_SOURCE;
        err
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Field errors carried by a validation failure.
    pub fn field_errors(&self) -> Option<&Value> {
        self.details.get("errors")
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self.kind {
            ErrorKind::Authentication => "Unauthenticated.".to_string(),
            ErrorKind::Validation => "The given data was invalid.".to_string(),
            ErrorKind::NotFound | ErrorKind::RouteNotFound => "Resource not found.".to_string(),
            ErrorKind::Authorization | ErrorKind::Conflict => self.error.to_string(),
            ErrorKind::Unclassified if self.status.is_client_error() => self.error.to_string(),
            ErrorKind::Unclassified => "Server Error".to_string(),
        }
    }

    /// The log channel this error is reported on.
    pub fn channel(&self) -> LogChannel {
        match self.kind {
            ErrorKind::Authentication => LogChannel::Auth,
            ErrorKind::Authorization | ErrorKind::RouteNotFound => LogChannel::Security,
            ErrorKind::Validation | ErrorKind::Conflict => LogChannel::Api,
            ErrorKind::NotFound => LogChannel::Database,
            ErrorKind::Unclassified => classify_source(self.source_type, self.status),
        }
    }

    /// Whether this fault also belongs on the security channel at critical severity.
    pub fn is_fatal_shape(&self) -> bool {
        self.kind == ErrorKind::Unclassified
            && (self.source_type == PANIC_SOURCE
                || FATAL_SHAPES
                    .iter()
                    .any(|shape| self.source_type.contains(shape)))
    }
}

/// Routes an unclassified fault by the type name of its source error.
pub fn classify_source(source_type: &str, status: StatusCode) -> LogChannel {
    if ["Database", "Query", "sqlx"]
        .iter()
        .any(|needle| source_type.contains(needle))
    {
        LogChannel::Database
    } else if ["jsonwebtoken", "Auth"]
        .iter()
        .any(|needle| source_type.contains(needle))
    {
        LogChannel::Auth
    } else if status.is_client_error() {
        LogChannel::Security
    } else {
        LogChannel::App
    }
}

/// Attached to every error response so the reporter layer can log it with
/// request context and reshape it for browser callers.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(self.public_message()));
        for (key, value) in &self.details {
            body.insert(key.clone(), value.clone());
        }

        let mut response = (self.status, Json(Value::Object(body))).into_response();
        response
            .extensions_mut()
            .insert(ErrorReport(Arc::new(self)));
        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    #[track_caller]
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeQueryError;

    impl std::fmt::Display for FakeQueryError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("relation does not exist")
        }
    }

    impl std::error::Error for FakeQueryError {}

    #[derive(Debug)]
    struct TemplateParseError;

    impl std::fmt::Display for TemplateParseError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("unexpected token")
        }
    }

    impl std::error::Error for TemplateParseError {}

    #[test]
    fn test_kind_follows_status() {
        assert_eq!(
            AppError::unauthorized("missing token").kind,
            ErrorKind::Authentication
        );
        assert_eq!(AppError::forbidden("no").kind, ErrorKind::Authorization);
        assert_eq!(
            AppError::not_found(anyhow!("Customer not found")).kind,
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::validation(FieldErrors::new()).kind,
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::route_not_found("/nope").kind,
            ErrorKind::RouteNotFound
        );
    }

    #[test]
    fn test_channel_table() {
        assert_eq!(AppError::unauthorized("x").channel(), LogChannel::Auth);
        assert_eq!(
            AppError::validation(FieldErrors::new()).channel(),
            LogChannel::Api
        );
        assert_eq!(
            AppError::not_found(anyhow!("gone")).channel(),
            LogChannel::Database
        );
        assert_eq!(
            AppError::route_not_found("/x").channel(),
            LogChannel::Security
        );
    }

    #[test]
    fn test_unclassified_routed_by_source_type() {
        assert_eq!(AppError::internal(FakeQueryError).channel(), LogChannel::Database);
        assert_eq!(
            AppError::bad_request(anyhow!("Invalid request body")).channel(),
            LogChannel::Security
        );
        assert_eq!(
            AppError::internal(anyhow!("boom")).channel(),
            LogChannel::App
        );
        assert_eq!(
            classify_source("jsonwebtoken::errors::Error", StatusCode::INTERNAL_SERVER_ERROR),
            LogChannel::Auth
        );
    }

    #[test]
    fn test_database_errors_keep_their_channel_through_context() {
        use anyhow::Context;

        let err = Err::<(), _>(FakeQueryError)
            .context("Failed to fetch customer")
            .map_err(AppError::database)
            .unwrap_err();
        assert_eq!(err.source_type, DATABASE_SOURCE);
        assert_eq!(err.channel(), LogChannel::Database);
        assert_eq!(err.public_message(), "Server Error");
    }

    #[test]
    fn test_fatal_shapes() {
        assert!(AppError::internal(TemplateParseError).is_fatal_shape());
        assert!(AppError::panic("index out of bounds").is_fatal_shape());
        assert!(!AppError::internal(FakeQueryError).is_fatal_shape());
        assert!(!AppError::forbidden("no").is_fatal_shape());
    }

    #[test]
    fn test_server_errors_do_not_leak_detail() {
        let err = AppError::internal(anyhow!("password column missing"));
        assert_eq!(err.public_message(), "Server Error");
    }

    #[test]
    fn test_insufficient_privileges_details() {
        let err = AppError::insufficient_privileges(&["admin", "manager"], "employee");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.details["required_roles"], json!(["admin", "manager"]));
        assert_eq!(err.details["user_role"], json!("employee"));
    }

    #[test]
    fn test_question_mark_records_source_type() {
        fn failing() -> Result<(), AppError> {
            Err::<(), _>(FakeQueryError)?;
            Ok(())
        }

        let err = failing().unwrap_err();
        assert!(err.source_type.ends_with("FakeQueryError"));
        assert_eq!(err.channel(), LogChannel::Database);
    }

    #[test]
    fn test_into_response_attaches_report() {
        let response = AppError::conflict("Could not allocate a unique code", true).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.0.kind, ErrorKind::Conflict);
    }
}
