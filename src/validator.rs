//! JSON extractors that turn decode and validation failures into field errors.

use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use opsdesk_core::{AppError, FieldErrors};

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// `additional_contacts[2].email` -> `additional_contacts.2.email`
fn dotted_path(path: &str) -> String {
    path.replace('[', ".").replace(']', "")
}

/// Splits axum's data-error text into the failing field path and serde's
/// message, when the failure is attributable to a field.
fn field_failure(text: &str) -> Option<(String, String)> {
    let detail = text.strip_prefix(DATA_ERROR_PREFIX)?;
    let (path, message) = detail.split_once(": ")?;
    if path.is_empty() || path == "." || path.contains(' ') {
        return None;
    }
    Some((dotted_path(path), message.to_string()))
}

fn missing_field(text: &str) -> Option<String> {
    text.split("missing field `")
        .nth(1)
        .and_then(|s| s.split('`').next())
        .map(str::to_string)
}

fn field_label(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).replace('_', " ")
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request(anyhow!(
            "Missing 'Content-Type: application/json' header"
        ));
    }

    let text = rejection.body_text();
    let failure = field_failure(&text);

    if let Some(field) = missing_field(&text) {
        let key = match &failure {
            Some((parent, _)) => format!("{}.{}", parent, field),
            None => field.clone(),
        };
        let message = format!("The {} field is required.", field_label(&field));
        return AppError::invalid_field(&key, message);
    }

    if let (JsonRejection::JsonDataError(_), Some((field, detail))) = (&rejection, failure) {
        let message = if detail.starts_with("invalid type") {
            format!("The {} field has an invalid type.", field_label(&field))
        } else {
            format!("The {} is invalid.", field_label(&field))
        };
        return AppError::invalid_field(&field, message);
    }

    AppError::bad_request(anyhow!("Invalid request body"))
}

/// Decodes a JSON body without running `validator` rules. Used for payloads
/// that go through the entity validation pipeline instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayload<T>(pub T);

impl<T, S> FromRequest<S> for JsonPayload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        Ok(JsonPayload(value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonPayload(value) = JsonPayload::<T>::from_request(req, state).await?;

        value
            .validate()
            .map_err(|errors| AppError::validation(FieldErrors::from_validation(&errors)))?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Validate)]
    struct Form {
        #[validate(length(min = 1, max = 5))]
        name: String,
        count: Option<i32>,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(
            dotted_path("additional_contacts[2].email"),
            "additional_contacts.2.email"
        );
    }

    #[tokio::test]
    async fn test_validation_failure_is_422_with_field_errors() {
        let err = ValidatedJson::<Form>::from_request(json_request(r#"{"name":"toolong"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.field_errors().unwrap().get("name").is_some());
    }

    #[tokio::test]
    async fn test_missing_field_is_a_field_error() {
        let err = ValidatedJson::<Form>::from_request(json_request(r#"{"count":1}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.field_errors().unwrap()["name"],
            json!(["The name field is required."])
        );
    }

    #[tokio::test]
    async fn test_wrong_type_is_keyed_by_field() {
        let err = JsonPayload::<Form>::from_request(
            json_request(r#"{"name":"ok","count":"many"}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.field_errors().unwrap().get("count").is_some());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = JsonPayload::<Form>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"name":"ok"}"#))
            .unwrap();
        let err = JsonPayload::<Form>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
