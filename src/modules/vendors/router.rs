use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::pipeline::GatePipeline;
use crate::middleware::role::{ADMIN, ANY_ROLE, MANAGERS};
use crate::modules::vendors::controller::{
    create_vendor, delete_vendor, get_vendor, list_vendors, update_vendor,
};
use crate::state::AppState;

pub fn init_vendors_router(gates: &GatePipeline) -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list_vendors))
        .route("/{id}", get(get_vendor));
    let write = Router::new()
        .route("/", post(create_vendor))
        .route("/{id}", put(update_vendor));
    let remove = Router::new().route("/{id}", delete(delete_vendor));

    Router::new()
        .merge(gates.clone().roles(ANY_ROLE).protect(read))
        .merge(gates.clone().roles(MANAGERS).protect(write))
        .merge(gates.clone().roles(ADMIN).protect(remove))
}
