//! API handlers for the OmniBiz backend

pub mod analytics;
pub mod messaging;
pub mod payments;
pub mod wallet;

pub use analytics::get_analytics;
pub use messaging::*;
pub use payments::webhook_payment_update;
pub use wallet::*;

use axum::http::StatusCode;
use axum::Json;

use crate::messaging::MessagingError;
use crate::models::ApiResponse;
use crate::wallet::WalletError;

pub(crate) type HandlerResult<T> =
    Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

/// Map a wallet error to an HTTP response.
///
/// Validation errors are 400, policy violations 422, absence 404. Storage
/// and hashing failures are logged and surfaced as a generic retry message.
pub(crate) fn wallet_error<T>(err: WalletError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &err {
        WalletError::InvalidAmount
        | WalletError::MissingRecipient
        | WalletError::PinRequired
        | WalletError::InvalidPin
        | WalletError::PinFormat
        | WalletError::InvalidLimit
        | WalletError::InvalidStatusTransition => StatusCode::BAD_REQUEST,
        WalletError::ExceedsPerTransactionLimit
        | WalletError::ExceedsDailyLimit
        | WalletError::InsufficientBalance
        | WalletError::WalletFrozen
        | WalletError::WalletInactive => StatusCode::UNPROCESSABLE_ENTITY,
        WalletError::NotFound | WalletError::EntryNotFound => StatusCode::NOT_FOUND,
        WalletError::Database(_) | WalletError::PinHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "wallet operation failed");
        return (
            status,
            Json(ApiResponse::err("Something went wrong, please try again")),
        );
    }
    (status, Json(ApiResponse::err(err.to_string())))
}

/// Map a messaging error to an HTTP response
pub(crate) fn messaging_error<T>(err: MessagingError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &err {
        MessagingError::EmptyContent | MessagingError::ContentTooLong => StatusCode::BAD_REQUEST,
        MessagingError::Forbidden => StatusCode::FORBIDDEN,
        MessagingError::NotFound | MessagingError::MessageNotFound => StatusCode::NOT_FOUND,
        MessagingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "messaging operation failed");
        return (
            status,
            Json(ApiResponse::err("Something went wrong, please try again")),
        );
    }
    (status, Json(ApiResponse::err(err.to_string())))
}
