//! Wallet API handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{wallet_error, HandlerResult};
use crate::app_state::AppState;
use crate::models::{ApiResponse, FinancialTransaction, LinkedAccount, Wallet};
use crate::wallet::{
    DepositRequest, LinkAccountRequest, SetPinRequest, TransferRequest, UpdateLimitsRequest,
    VerifyPinRequest, WalletError, WalletEvent, WalletSummary, WalletUpdateKind, WithdrawRequest,
};

/// Balance plus the ledger entry a mutation produced
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
    pub ledger_entry: FinancialTransaction,
}

/// Both ledger entries written by a transfer
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub sender_balance: Decimal,
    pub sender_ledger_entry: FinancialTransaction,
    pub recipient_ledger_entry: FinancialTransaction,
}

#[derive(Debug, Serialize)]
pub struct VerifyPinResponse {
    pub verified: bool,
}

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub daily_limit: Decimal,
    pub per_transaction_limit: Decimal,
}

/// Get the wallet summary (creates the wallet on first access)
pub async fn get_wallet(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> HandlerResult<WalletSummary> {
    match app_state.wallet_service.summary(user_id).await {
        Ok(summary) => Ok(Json(ApiResponse::ok(summary))),
        Err(e) => Err(wallet_error(e)),
    }
}

/// Deposit into the wallet
pub async fn deposit(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<DepositRequest>,
) -> HandlerResult<BalanceResponse> {
    match app_state.wallet_service.deposit(user_id, request).await {
        Ok((wallet, entry)) => {
            app_state
                .ws_state
                .send_to_user(
                    user_id,
                    &WalletEvent::WalletUpdated {
                        user_id,
                        balance: wallet.balance,
                        transaction: entry.clone(),
                        kind: WalletUpdateKind::Deposit,
                    },
                )
                .await;

            Ok(Json(ApiResponse::ok(BalanceResponse {
                balance: wallet.balance,
                ledger_entry: entry,
            })))
        }
        Err(e) => Err(wallet_error(e)),
    }
}

/// Withdraw from the wallet
pub async fn withdraw(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<WithdrawRequest>,
) -> HandlerResult<BalanceResponse> {
    match app_state.wallet_service.withdraw(user_id, request).await {
        Ok((wallet, entry)) => {
            app_state
                .ws_state
                .send_to_user(
                    user_id,
                    &WalletEvent::WalletUpdated {
                        user_id,
                        balance: wallet.balance,
                        transaction: entry.clone(),
                        kind: WalletUpdateKind::Withdrawal,
                    },
                )
                .await;

            Ok(Json(ApiResponse::ok(BalanceResponse {
                balance: wallet.balance,
                ledger_entry: entry,
            })))
        }
        Err(e) => Err(wallet_error(e)),
    }
}

/// Transfer to another user's wallet
pub async fn transfer(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> HandlerResult<TransferResponse> {
    let Some(recipient_id) = request.recipient_id else {
        return Err(wallet_error(WalletError::MissingRecipient));
    };

    match app_state
        .wallet_service
        .transfer(
            user_id,
            recipient_id,
            request.amount,
            request.pin.as_deref(),
            request.description,
        )
        .await
    {
        Ok(outcome) => {
            app_state
                .ws_state
                .send_to_user(
                    user_id,
                    &WalletEvent::WalletUpdated {
                        user_id,
                        balance: outcome.sender_wallet.balance,
                        transaction: outcome.sender_entry.clone(),
                        kind: WalletUpdateKind::TransferOut,
                    },
                )
                .await;
            app_state
                .ws_state
                .send_to_user(
                    recipient_id,
                    &WalletEvent::WalletUpdated {
                        user_id: recipient_id,
                        balance: outcome.recipient_wallet.balance,
                        transaction: outcome.recipient_entry.clone(),
                        kind: WalletUpdateKind::TransferIn,
                    },
                )
                .await;

            Ok(Json(ApiResponse::ok(TransferResponse {
                sender_balance: outcome.sender_wallet.balance,
                sender_ledger_entry: outcome.sender_entry,
                recipient_ledger_entry: outcome.recipient_entry,
            })))
        }
        Err(e) => Err(wallet_error(e)),
    }
}

/// Set or change the transaction PIN
pub async fn set_pin(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SetPinRequest>,
) -> HandlerResult<()> {
    if let Err(e) = request.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(format!("Validation error: {}", e))),
        ));
    }

    match app_state
        .wallet_service
        .set_pin(user_id, &request.pin, request.current_pin.as_deref())
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::ok(()))),
        Err(e) => Err(wallet_error(e)),
    }
}

/// Verify a candidate PIN
pub async fn verify_pin(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<VerifyPinRequest>,
) -> HandlerResult<VerifyPinResponse> {
    match app_state
        .wallet_service
        .verify_pin(user_id, &request.pin)
        .await
    {
        Ok(verified) => Ok(Json(ApiResponse::ok(VerifyPinResponse { verified }))),
        Err(e) => Err(wallet_error(e)),
    }
}

/// Get spending limits
pub async fn get_limits(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> HandlerResult<LimitsResponse> {
    match app_state.wallet_service.limits(user_id).await {
        Ok((daily_limit, per_transaction_limit)) => Ok(Json(ApiResponse::ok(LimitsResponse {
            daily_limit,
            per_transaction_limit,
        }))),
        Err(e) => Err(wallet_error(e)),
    }
}

/// Update spending limits
pub async fn update_limits(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateLimitsRequest>,
) -> HandlerResult<LimitsResponse> {
    match app_state
        .wallet_service
        .update_limits(user_id, request.daily_limit, request.per_transaction_limit)
        .await
    {
        Ok(wallet) => Ok(Json(ApiResponse::ok(LimitsResponse {
            daily_limit: wallet.daily_limit,
            per_transaction_limit: wallet.per_transaction_limit,
        }))),
        Err(e) => Err(wallet_error(e)),
    }
}

/// Connect an external payment account
pub async fn link_account(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<LinkAccountRequest>,
) -> HandlerResult<Wallet> {
    if let Err(e) = request.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(format!("Validation error: {}", e))),
        ));
    }

    let account = LinkedAccount {
        provider: request.provider,
        account_ref: request.account_ref,
        label: request.label,
    };
    match app_state.wallet_service.link_account(user_id, account).await {
        Ok(wallet) => Ok(Json(ApiResponse::ok(wallet))),
        Err(e) => Err(wallet_error(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Ledger statement, newest first
pub async fn list_transactions(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> HandlerResult<Vec<FinancialTransaction>> {
    let limit = query.limit.unwrap_or(50).min(100); // Max 100 items
    let offset = query.offset.unwrap_or(0);

    match app_state
        .wallet_service
        .list_transactions(user_id, limit, offset)
        .await
    {
        Ok(entries) => Ok(Json(ApiResponse::ok(entries))),
        Err(e) => Err(wallet_error(e)),
    }
}
