use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::pipeline::GatePipeline;
use crate::middleware::role::{ADMIN, ANY_ROLE, MANAGERS};
use crate::modules::customers::controller::{
    create_customer, delete_customer, get_customer, list_customers, update_customer,
};
use crate::state::AppState;

pub fn init_customers_router(gates: &GatePipeline) -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list_customers))
        .route("/{id}", get(get_customer));
    let write = Router::new()
        .route("/", post(create_customer))
        .route("/{id}", put(update_customer));
    let remove = Router::new().route("/{id}", delete(delete_customer));

    Router::new()
        .merge(gates.clone().roles(ANY_ROLE).protect(read))
        .merge(gates.clone().roles(MANAGERS).protect(write))
        .merge(gates.clone().roles(ADMIN).protect(remove))
}
