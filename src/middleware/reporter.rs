//! Error reporter.
//!
//! Handlers and gates return [`AppError`]s, which render as JSON and carry an
//! [`ErrorReport`] in the response extensions. This layer picks the report up,
//! logs it on the channel its kind maps to with request context, and reshapes
//! the response for browser callers.

use std::any::Any;
use std::backtrace::Backtrace;

use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info, warn};

use opsdesk_core::{AppError, ErrorKind, ErrorReport, LogChannel};

use crate::middleware::auth::AuthenticatedAs;
use crate::middleware::caller::{CallerKind, RequestContext};
use crate::pages::error_page;

/// `tracing` needs a literal target, so each channel gets its own arm.
macro_rules! log_on_channel {
    ($channel:expr, $level:ident, $($rest:tt)+) => {
        match $channel {
            LogChannel::App => $level!(target: "app", $($rest)+),
            LogChannel::Auth => $level!(target: "auth", $($rest)+),
            LogChannel::Api => $level!(target: "api", $($rest)+),
            LogChannel::Database => $level!(target: "database", $($rest)+),
            LogChannel::Security => $level!(target: "security", $($rest)+),
            LogChannel::Audit => $level!(target: "audit", $($rest)+),
            LogChannel::Financial => $level!(target: "financial", $($rest)+),
        }
    };
}

fn log_report(err: &AppError, context: &RequestContext, principal_id: Option<&str>) {
    let channel = err.channel();
    let location = format!("{}:{}", err.location.file(), err.location.line());
    let message = format!("{:#}", err.error);

    match err.kind {
        ErrorKind::Unclassified => {
            let backtrace = Backtrace::force_capture().to_string();
            log_on_channel!(
                channel,
                error,
                error_source_type = err.source_type,
                error_message = %message,
                error_location = %location,
                backtrace = %backtrace,
                status = err.status.as_u16(),
                method = %context.method,
                url = %context.url,
                ip = %context.ip,
                principal_id,
                "Unhandled error"
            );
            if err.is_fatal_shape() {
                error!(
                    target: "security",
                    critical = true,
                    error_source_type = err.source_type,
                    error_message = %message,
                    error_location = %location,
                    method = %context.method,
                    url = %context.url,
                    ip = %context.ip,
                    principal_id,
                    "Critical error"
                );
            }
        }
        ErrorKind::Validation => log_on_channel!(
            channel,
            info,
            errors = %err.field_errors().cloned().unwrap_or_default(),
            method = %context.method,
            url = %context.url,
            principal_id,
            "Validation failed"
        ),
        _ => log_on_channel!(
            channel,
            warn,
            kind = ?err.kind,
            status = err.status.as_u16(),
            error_message = %message,
            method = %context.method,
            url = %context.url,
            ip = %context.ip,
            user_agent = %context.user_agent,
            principal_id,
            "Request failed"
        ),
    }
}

/// What a browser sees instead of the JSON envelope.
fn browser_response(err: &AppError) -> Response {
    match err.kind {
        ErrorKind::Authentication => Redirect::to("/login").into_response(),
        _ => (
            err.status,
            error_page(err.status, &err.public_message(), err.field_errors()),
        )
            .into_response(),
    }
}

pub async fn report_errors(req: Request, next: Next) -> Response {
    let context = RequestContext::capture(req.method(), req.uri(), req.headers(), req.extensions());
    report_with_context(context, next.run(req).await)
}

fn report_with_context(context: RequestContext, response: Response) -> Response {
    let Some(ErrorReport(err)) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    let principal_id = response
        .extensions()
        .get::<AuthenticatedAs>()
        .map(|a| a.0.to_string());

    log_report(&err, &context, principal_id.as_deref());

    if context.caller != CallerKind::Browser {
        return response;
    }

    let mut reshaped = browser_response(&err);
    // Keep cookie changes made by the gates, e.g. a cleared session.
    for value in response.headers().get_all(header::SET_COOKIE) {
        reshaped
            .headers_mut()
            .append(header::SET_COOKIE, value.clone());
    }
    reshaped.extensions_mut().insert(ErrorReport(err));
    reshaped
}

/// Turns a panic caught by `CatchPanicLayer` into an unclassified fault.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::panic(message).into_response()
}

/// Handler for requests that match no route.
pub async fn route_not_found(req: Request) -> AppError {
    AppError::route_not_found(req.uri().path())
}
