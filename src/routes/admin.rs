use axum::{
    middleware,
    routing::{post, put},
    Router,
};

use crate::handlers::products;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

/// Catalog management; handlers enforce the admin role on top of the
/// bearer-token layer.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", post(products::create_product))
        .route(
            "/products/:id",
            put(products::update_product).delete(products::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
