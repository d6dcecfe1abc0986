//! Dashboard analytics handler
//!
//! Aggregate counts over the core collections, memoized through an explicit
//! TTL cache owned by the service. Staleness tolerance is 30 seconds.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use super::HandlerResult;
use crate::app_state::AppState;
use crate::cache::TtlCache;
use crate::models::ApiResponse;

const ANALYTICS_TTL: Duration = Duration::from_secs(30);

/// Aggregate view of the core collections
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_wallets: i64,
    pub ledger_volume: Decimal,
    pub active_conversations: i64,
    pub total_messages: i64,
}

/// Analytics service
pub struct AnalyticsService {
    pool: Arc<PgPool>,
    cache: TtlCache<&'static str, AnalyticsSnapshot>,
}

impl AnalyticsService {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            cache: TtlCache::new(),
        }
    }

    /// Cached aggregate snapshot
    pub async fn snapshot(&self) -> Result<AnalyticsSnapshot, sqlx::Error> {
        let pool = self.pool.clone();
        self.cache
            .get_or_load("snapshot", ANALYTICS_TTL, || async move {
                let total_wallets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
                    .fetch_one(&*pool)
                    .await?;
                let ledger_volume: Decimal = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(amount), 0) FROM financial_transactions WHERE status = 'completed'",
                )
                .fetch_one(&*pool)
                .await?;
                let active_conversations: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM conversations WHERE status = 'active'",
                )
                .fetch_one(&*pool)
                .await?;
                let total_messages: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE NOT deleted")
                        .fetch_one(&*pool)
                        .await?;

                Ok(AnalyticsSnapshot {
                    total_wallets,
                    ledger_volume,
                    active_conversations,
                    total_messages,
                })
            })
            .await
    }
}

/// Aggregate dashboard counters
pub async fn get_analytics(
    State(app_state): State<AppState>,
) -> HandlerResult<AnalyticsSnapshot> {
    match app_state.analytics_service.snapshot().await {
        Ok(snapshot) => Ok(Json(ApiResponse::ok(snapshot))),
        Err(e) => {
            tracing::error!(error = %e, "analytics query failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("Something went wrong, please try again")),
            ))
        }
    }
}
