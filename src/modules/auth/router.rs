use axum::{
    Router,
    routing::{get, post},
};

use super::controller::{get_me, login, logout, register, update_me};
use crate::middleware::pipeline::GatePipeline;
use crate::middleware::role::ANY_ROLE;
use crate::state::AppState;

pub fn init_auth_router(gates: &GatePipeline) -> Router<AppState> {
    let session = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_me).put(update_me));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(gates.clone().roles(ANY_ROLE).protect(session))
}
