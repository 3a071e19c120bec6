use axum::{
    Router,
    routing::{delete, get, patch},
};

use crate::middleware::pipeline::GatePipeline;
use crate::middleware::role::ADMIN;
use crate::modules::principals::controller::{
    delete_principal, list_principals, update_principal_role, update_principal_status,
};
use crate::state::AppState;

pub fn init_principals_router(gates: &GatePipeline) -> Router<AppState> {
    let admin = Router::new()
        .route("/", get(list_principals))
        .route("/{id}", delete(delete_principal))
        .route("/{id}/status", patch(update_principal_status))
        .route("/{id}/role", patch(update_principal_role));

    gates.clone().roles(ADMIN).protect(admin)
}
