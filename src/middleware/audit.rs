//! Request audit logging.
//!
//! Every request produces an `Incoming request` event before the handler runs
//! and a `Request completed` event after it, both on the `api` channel, plus
//! one write-once entry on the `audit` channel. Credentials never reach a log
//! line: credential headers are dropped and password-like keys are removed
//! from JSON bodies at any depth. Logging is best effort and never fails the
//! request.

use axum::{
    body::{Body, BodyDataStream, Bytes},
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures::{StreamExt, stream};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::middleware::auth::{AuthenticatedAs, claimed_principal_id};
use crate::middleware::caller::RequestContext;
use crate::state::AppState;

const REDACTED_HEADERS: [&str; 7] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
];

const REDACTED_KEYS: [&str; 4] = [
    "password",
    "password_confirmation",
    "current_password",
    "new_password",
];

const SENSITIVE_FRAGMENTS: [&str; 3] = ["password", "secret", "token"];

/// Header map as JSON with credential headers removed.
pub fn loggable_headers(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for name in headers.keys() {
        if REDACTED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let value = match <[Value; 1]>::try_from(values) {
            Ok([single]) => single,
            Err(values) => Value::Array(values),
        };
        out.insert(name.as_str().to_string(), value);
    }
    Value::Object(out)
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    REDACTED_KEYS.contains(&key.as_str())
        || SENSITIVE_FRAGMENTS
            .iter()
            .any(|fragment| key.contains(fragment))
}

/// Removes password-like keys from `value`, descending into objects and arrays.
pub fn redact_body(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_sensitive_key(key));
            map.values_mut().for_each(redact_body);
        }
        Value::Array(items) => items.iter_mut().for_each(redact_body),
        _ => {}
    }
}

/// What the before-request event records about the body.
#[derive(Debug, PartialEq)]
enum BodyLog {
    Skipped,
    Json(Value),
    Size(Option<usize>),
    Unreadable,
}

impl BodyLog {
    fn json(&self) -> Option<String> {
        match self {
            BodyLog::Json(value) => Some(value.to_string()),
            _ => None,
        }
    }

    fn size(&self) -> Option<u64> {
        match self {
            BodyLog::Size(size) => size.map(|s| s as u64),
            _ => None,
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Buffers a JSON body up to `limit` bytes so it can be logged and then
/// replayed to the handler. Anything else is logged by size only. A body that
/// turns out larger than `limit` is handed on intact: the chunks read so far
/// are replayed ahead of the unread remainder.
async fn capture_body(body: Body, headers: &HeaderMap, limit: usize) -> (Body, BodyLog) {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));
    let declared = content_length(headers);

    if !is_json || declared.is_some_and(|len| len > limit) {
        return (body, BodyLog::Size(declared));
    }

    let mut stream = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut buffered = 0usize;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(chunk) => {
                buffered += chunk.len();
                chunks.push(chunk);
                if buffered > limit {
                    return (replay(chunks, None, stream), BodyLog::Size(declared));
                }
            }
            Err(err) => {
                warn!(target: "api", error = %err, "Failed to buffer request body for audit log");
                return (replay(chunks, Some(err), stream), BodyLog::Unreadable);
            }
        }
    }

    let bytes = Bytes::from(chunks.concat());
    let log = match serde_json::from_slice::<Value>(&bytes) {
        Ok(mut value) => {
            redact_body(&mut value);
            BodyLog::Json(value)
        }
        Err(_) => BodyLog::Size(Some(bytes.len())),
    };
    (Body::from(bytes), log)
}

/// Rebuilds a partially read body: buffered chunks, then the read error if
/// there was one, then whatever the stream still holds.
fn replay(chunks: Vec<Bytes>, failure: Option<axum::Error>, rest: BodyDataStream) -> Body {
    let head = chunks.into_iter().map(Ok).chain(failure.map(Err));
    Body::from_stream(stream::iter(head).chain(rest))
}

pub async fn audit_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let context = RequestContext::from_parts(&parts);
    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| context.path.clone());
    let claimed = claimed_principal_id(&parts.headers, &state.jwt_config, &state.session_config);

    let (body, body_log) = if parts.method == Method::GET {
        (body, BodyLog::Skipped)
    } else {
        capture_body(
            body,
            &parts.headers,
            state.logging_config.audit_body_limit_bytes,
        )
        .await
    };

    let claimed_id = claimed.map(|id| id.to_string());
    let body_json = body_log.json();
    info!(
        target: "api",
        method = %context.method,
        url = %context.url,
        ip = %context.ip,
        user_agent = %context.user_agent,
        principal_id = claimed_id.as_deref(),
        headers = %loggable_headers(&parts.headers),
        body = body_json.as_deref(),
        body_size = body_log.size(),
        body_unreadable = body_log == BodyLog::Unreadable,
        "Incoming request"
    );

    let response = next.run(Request::from_parts(parts, body)).await;

    let elapsed = start.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    let status = response.status().as_u16();
    let principal_id = response
        .extensions()
        .get::<AuthenticatedAs>()
        .map(|a| a.0)
        .or(claimed)
        .map(|id| id.to_string());

    macro_rules! completed {
        ($level:ident) => {
            $level!(
                target: "api",
                duration_ms,
                method = %context.method,
                url = %context.url,
                status,
                principal_id = principal_id.as_deref(),
                "Request completed"
            )
        };
    }
    match status {
        500.. => completed!(error),
        400..=499 => completed!(warn),
        _ => completed!(info),
    }

    let threshold = state.logging_config.slow_request_threshold();
    if elapsed > threshold {
        warn!(
            target: "api",
            duration_ms,
            threshold_ms = threshold.as_millis() as u64,
            method = %context.method,
            url = %context.url,
            ip = %context.ip,
            status,
            principal_id = principal_id.as_deref(),
            "slow request"
        );
    }

    info!(
        target: "audit",
        timestamp = %Utc::now().to_rfc3339(),
        actor_id = principal_id.as_deref(),
        action = %format!("{} {}", context.method, route),
        route = %route,
        ip = %context.ip,
        status,
        outcome = if status < 400 { "success" } else { "failure" },
        "Audit entry"
    );

    response
}
