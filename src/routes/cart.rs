use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::cart;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(cart::get_cart).delete(cart::clear_cart))
        .route("/items", post(cart::add_item))
        .route(
            "/items/:product_id",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
