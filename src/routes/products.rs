use axum::{routing::get, Router};

use crate::handlers::products;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list_products))
        .route("/:slug", get(products::get_product))
}
