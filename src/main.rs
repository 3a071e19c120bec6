use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use tracing::{info, warn};

use opsdesk::logging::{init_tracing, shutdown_tracer};
use opsdesk::metrics::init_metrics;
use opsdesk::opsdesk_config::LoggingConfig;
use opsdesk::opsdesk_db::run_migrations;
use opsdesk::router::init_router;
use opsdesk::state::init_app_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let logging_config = LoggingConfig::from_env();
    let guards = init_tracing(&logging_config)?;

    let state = init_app_state().await?;
    run_migrations(&state.db).await?;

    let metrics = if logging_config.observability_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let app = init_router(state, metrics);

    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(target: "app", address = %bind_address, "Server running");
    info!(target: "app", "Swagger UI available at /swagger-ui, Scalar at /scalar");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tracer(guards).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "app", error = %e, "Failed to listen for shutdown signal");
    }
    info!(target: "app", "Shutting down");
}
