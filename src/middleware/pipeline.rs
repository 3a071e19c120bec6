//! Fixed composition of the request gates.
//!
//! Routes never pick gates one by one: a [`GatePipeline`] always installs
//! authentication, then status, then role, and only the allowed role set
//! varies per route group.

use axum::{Router, extract::Request, middleware, middleware::Next};

use opsdesk_models::Role;

use crate::middleware::auth::require_auth;
use crate::middleware::role::{ANY_ROLE, require_roles};
use crate::middleware::status::require_active;
use crate::state::AppState;

#[derive(Clone)]
pub struct GatePipeline {
    state: AppState,
    allowed_roles: &'static [Role],
}

impl GatePipeline {
    /// A pipeline admitting any active, authenticated principal.
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            allowed_roles: ANY_ROLE,
        }
    }

    pub fn roles(mut self, allowed_roles: &'static [Role]) -> Self {
        self.allowed_roles = allowed_roles;
        self
    }

    /// Puts every route of `router` behind the gates.
    pub fn protect(self, router: Router<AppState>) -> Router<AppState> {
        let allowed_roles = self.allowed_roles;
        // The last route_layer added runs first.
        router
            .route_layer(middleware::from_fn(move |req: Request, next: Next| {
                require_roles(req, next, allowed_roles)
            }))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_active,
            ))
            .route_layer(middleware::from_fn_with_state(
                (self.state, allowed_roles),
                require_auth,
            ))
    }
}
