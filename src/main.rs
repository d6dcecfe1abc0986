//! OmniBiz Backend Server
//!
//! This is the main Rust backend server for OmniBiz, providing APIs for the
//! wallet ledger (balances, spend limits, transfers, payment callbacks) and
//! the business-owner/customer messaging store, with realtime push to
//! connected clients.

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use omnibiz_server::app_state::AppState;
use omnibiz_server::handlers::analytics::AnalyticsService;
use omnibiz_server::messaging::MessagingService;
use omnibiz_server::wallet::WalletService;
use omnibiz_server::{routes, websocket};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/omnibiz".to_string());
    let default_currency =
        std::env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "KES".to_string());
    let webhook_secret = std::env::var("WEBHOOK_SECRET").ok();

    // Initialize database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Database connected successfully");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let pool = Arc::new(db_pool);

    // Initialize WebSocket state
    let ws_state = websocket::WsState::new();

    // Initialize core services
    let wallet_service = Arc::new(WalletService::new(pool.clone(), default_currency));
    let messaging_service = Arc::new(MessagingService::new(pool.clone()));
    let analytics_service = Arc::new(AnalyticsService::new(pool.clone()));

    // Create shared app state
    let app_state = AppState::new(
        wallet_service,
        messaging_service,
        analytics_service,
        ws_state,
        webhook_secret,
    );

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(routes::wallet_routes())
        .merge(routes::messaging_routes())
        .merge(routes::payment_routes())
        .merge(routes::analytics_routes())
        .with_state(app_state)
        .layer(configure_cors());

    // Get port from environment or default to 3001
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse()
        .expect("PORT must be a number");

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!("Server starting on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn root() -> &'static str {
    "OmniBiz API Server"
}

async fn health_check() -> &'static str {
    "OK"
}

fn configure_cors() -> CorsLayer {
    let allowed_origins_str = std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .map(|s| s.trim().parse().expect("Invalid CORS origin"))
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
