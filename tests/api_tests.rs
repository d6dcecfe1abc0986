//! HTTP surface tests for the payment webhook

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use omnibiz_server::app_state::AppState;
use omnibiz_server::handlers::analytics::AnalyticsService;
use omnibiz_server::messaging::MessagingService;
use omnibiz_server::routes;
use omnibiz_server::wallet::WalletService;
use omnibiz_server::websocket::WsState;

fn app(pool: &PgPool, webhook_secret: Option<&str>) -> Router {
    let pool = Arc::new(pool.clone());
    let state = AppState::new(
        Arc::new(WalletService::new(pool.clone(), "KES".to_string())),
        Arc::new(MessagingService::new(pool.clone())),
        Arc::new(AnalyticsService::new(pool)),
        WsState::new(),
        webhook_secret.map(|s| s.to_string()),
    );
    Router::new()
        .merge(routes::wallet_routes())
        .merge(routes::payment_routes())
        .with_state(state)
}

fn webhook_request(secret: Option<&str>, reference: &str) -> Request<Body> {
    let body = format!(r#"{{"reference":"{reference}","status":"completed"}}"#);
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("X-Webhook-Secret", secret);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn seed_pending_entry(pool: &PgPool, reference: &str) {
    sqlx::query(
        r#"
        INSERT INTO financial_transactions
            (user_id, description, amount, entry_type, category, status, reference)
        VALUES ($1, 'STK push', 100.00, 'income', 'mpesa_payment', 'pending', $2)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(reference)
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test]
async fn webhook_rejects_everything_when_unconfigured(pool: PgPool) {
    seed_pending_entry(&pool, "ref-1").await;

    // No secret configured at all.
    let response = app(&pool, None)
        .oneshot(webhook_request(Some("whatever"), "ref-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // An empty secret is treated the same as none.
    let response = app(&pool, Some(""))
        .oneshot(webhook_request(Some(""), "ref-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[sqlx::test]
async fn webhook_requires_the_shared_secret(pool: PgPool) {
    seed_pending_entry(&pool, "ref-2").await;
    let app = app(&pool, Some("s3cret"));

    let response = app
        .clone()
        .oneshot(webhook_request(None, "ref-2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(webhook_request(Some("wrong"), "ref-2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(webhook_request(Some("s3cret"), "ref-2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: String =
        sqlx::query_scalar("SELECT status::text FROM financial_transactions WHERE reference = $1")
            .bind("ref-2")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "completed");
}

#[sqlx::test]
async fn webhook_reports_unknown_references(pool: PgPool) {
    let response = app(&pool, Some("s3cret"))
        .oneshot(webhook_request(Some("s3cret"), "no-such-ref"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn wallet_endpoint_serves_a_fresh_wallet(pool: PgPool) {
    let user = Uuid::new_v4();
    let response = app(&pool, None)
        .oneshot(
            Request::builder()
                .uri(format!("/api/wallet/{user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
