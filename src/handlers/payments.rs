//! Payment-gateway webhook handler
//!
//! Gateways (M-Pesa STK push, PayPal) confirm asynchronously: the only thing
//! they may do here is advance a pending ledger entry to a terminal status.
//! The wallet mutation that created the entry already stands either way.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{wallet_error, HandlerResult};
use crate::app_state::AppState;
use crate::models::{ApiResponse, FinancialTransaction, TransactionStatus};
use crate::wallet::WalletEvent;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookPayload {
    pub reference: String,
    pub status: TransactionStatus,
}

/// Webhook endpoint for asynchronous payment status callbacks
pub async fn webhook_payment_update(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhookPayload>,
) -> HandlerResult<FinancialTransaction> {
    // Authenticate webhook
    match &app_state.webhook_secret {
        Some(secret) if !secret.is_empty() => {
            let auth_header = headers
                .get("X-Webhook-Secret")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();

            if auth_header != secret {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ApiResponse::err("Unauthorized webhook request")),
                ));
            }
        }
        _ => {
            // Fail-closed: if secret is not configured or empty, reject all requests
            tracing::error!("Webhook secret not configured - rejecting request");
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::err("Webhook endpoint is not configured")),
            ));
        }
    }

    match app_state
        .wallet_service
        .update_transaction_status(&payload.reference, payload.status)
        .await
    {
        Ok(entry) => {
            let event = if entry.status == TransactionStatus::Completed {
                WalletEvent::PaymentSuccess {
                    user_id: entry.user_id,
                    transaction: entry.clone(),
                }
            } else {
                WalletEvent::PaymentFailed {
                    user_id: entry.user_id,
                    transaction: entry.clone(),
                }
            };
            app_state.ws_state.send_to_user(entry.user_id, &event).await;

            Ok(Json(ApiResponse::ok(entry)))
        }
        Err(e) => Err(wallet_error(e)),
    }
}
