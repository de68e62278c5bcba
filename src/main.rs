use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use config::AppConfig;
use database::connection::get_db_client;
use database::payment_store::{MongoOrderStore, MongoTransactionStore};
use services::email_service::EmailService;
use services::mpesa_service::MpesaService;
use services::payment_service::PaymentService;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        "M-Pesa environment: {} (shortcode {})",
        config.mpesa_environment,
        config.mpesa_short_code
    );

    let db = get_db_client(&config.database_url, &config.database_name).await;
    let app_state = initialize_app_state(db, config.clone());

    let app = build_router(app_state);
    start_server(app, &config).await;
}

fn initialize_app_state(db: mongodb::Database, config: AppConfig) -> AppState {
    let gateway = Arc::new(MpesaService::new(config.clone()));
    let transactions = Arc::new(MongoTransactionStore::new(&db));
    let orders = Arc::new(MongoOrderStore::new(&db));
    let payments = Arc::new(PaymentService::new(
        gateway,
        transactions,
        orders,
        &config,
    ));

    let email = Arc::new(EmailService::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
        config.mail_from_name.clone(),
    ));

    AppState::new(db, config.jwt_secret.clone(), payments, email)
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", routes::auth::routes(app_state.clone()))
        .nest("/api/products", routes::products::routes())
        .nest("/api/admin", routes::admin::routes(app_state.clone()))
        .nest("/api/cart", routes::cart::routes(app_state.clone()))
        .nest("/api/orders", routes::orders::routes(app_state.clone()))
        .nest("/api/payments", routes::payments::routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(listener, app).await.unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "MediQuip API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
