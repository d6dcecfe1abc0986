//! Route definitions for the OmniBiz API

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::app_state::AppState;
use crate::handlers::*;

// Wallet routes
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wallet/:user_id", get(get_wallet))
        .route("/api/wallet/:user_id/deposit", post(deposit))
        .route("/api/wallet/:user_id/withdraw", post(withdraw))
        .route("/api/wallet/:user_id/transfer", post(transfer))
        .route("/api/wallet/:user_id/pin", post(set_pin))
        .route("/api/wallet/:user_id/pin/verify", post(verify_pin))
        .route("/api/wallet/:user_id/limits", get(get_limits))
        .route("/api/wallet/:user_id/limits", put(update_limits))
        .route("/api/wallet/:user_id/accounts", post(link_account))
        .route("/api/wallet/:user_id/transactions", get(list_transactions))
}

// Messaging routes
pub fn messaging_routes() -> Router<AppState> {
    Router::new()
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/:id/messages", get(get_messages))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/conversations/:id/read", post(mark_conversation_read))
        .route("/api/conversations/:id/status", put(update_conversation_status))
        .route("/api/messages/:id/read", post(mark_message_read))
        .route("/api/messages/:id", delete(delete_message))
}

// Payment gateway callback routes
pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/api/payments/webhook", post(webhook_payment_update))
}

// Analytics routes
pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/api/analytics", get(get_analytics))
}
