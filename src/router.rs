use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{Json, Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::metrics::{metrics_middleware, metrics_router};
use crate::middleware::audit::audit_requests;
use crate::middleware::auth::CSRF_HEADER;
use crate::middleware::pipeline::GatePipeline;
use crate::middleware::reporter::{handle_panic, report_errors, route_not_found};
use crate::modules::auth::controller::login_form;
use crate::modules::auth::router::init_auth_router;
use crate::modules::customers::router::init_customers_router;
use crate::modules::principals::router::init_principals_router;
use crate::modules::vendors::router::init_vendors_router;
use crate::pages::login_page;
use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = state
        .cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true)
}

/// Builds the application. Request flow, outermost first: CORS, metrics,
/// audit logger, error reporter, panic catcher, then routing where gated
/// groups run authentication, status and role gates before the handler.
pub fn init_router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let gates = GatePipeline::new(state.clone());

    let api = Router::new()
        .nest("/auth", init_auth_router(&gates))
        .nest("/customers", init_customers_router(&gates))
        .nest("/vendors", init_vendors_router(&gates))
        .nest("/principals", init_principals_router(&gates));

    let mut app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/login", get(login_page).post(login_form))
        .nest("/api", api)
        .fallback(route_not_found)
        .with_state(state.clone());

    if let Some(handle) = metrics {
        app = app.merge(metrics_router(handle));
    }

    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(report_errors))
        .layer(middleware::from_fn_with_state(state.clone(), audit_requests))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors_layer(&state))
}
