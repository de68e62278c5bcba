use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
}
