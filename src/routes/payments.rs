use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::payment_handlers;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stk-push", post(payment_handlers::initiate_stk_push))
        .route(
            "/status/:checkout_request_id",
            get(payment_handlers::check_payment_status),
        )
        .route(
            "/orders/:order_number/transactions",
            get(payment_handlers::get_order_transactions),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        // Provider-facing; authenticated by obscurity of the callback URL,
        // never by bearer token.
        .route("/callback", post(payment_handlers::mpesa_callback))
}
