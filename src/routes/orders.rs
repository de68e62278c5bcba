use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::orders;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create_order).get(orders::list_orders))
        .route("/:order_number", get(orders::get_order))
        .route("/:order_number/cancel", post(orders::cancel_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
