//! Wallet ledger service for the OmniBiz backend
//!
//! Owns per-user balances, spend-limit policy, PIN gating and the audit
//! ledger. Every balance mutation runs inside a database transaction with the
//! wallet row locked, so the check-and-mutate sequence is serialized per
//! wallet, and the matching ledger entry is written in the same transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    FinancialTransaction, LedgerEntryType, LinkedAccount, TransactionCategory, TransactionStatus,
    Wallet,
};

/// Wallet service error
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("PIN hashing failed: {0}")]
    PinHash(#[from] bcrypt::BcryptError),
    #[error("Wallet not found")]
    NotFound,
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("A recipient other than the sender is required")]
    MissingRecipient,
    #[error("Transaction PIN is required")]
    PinRequired,
    #[error("Incorrect transaction PIN")]
    InvalidPin,
    #[error("PIN must be 4 to 6 digits")]
    PinFormat,
    #[error("Amount exceeds the per-transaction limit")]
    ExceedsPerTransactionLimit,
    #[error("Amount exceeds the remaining daily limit")]
    ExceedsDailyLimit,
    #[error("Insufficient wallet balance")]
    InsufficientBalance,
    #[error("Wallet is frozen")]
    WalletFrozen,
    #[error("Wallet is inactive")]
    WalletInactive,
    #[error("Limits must be greater than zero")]
    InvalidLimit,
    #[error("Ledger entry not found or already finalized")]
    EntryNotFound,
    #[error("Unsupported ledger status transition")]
    InvalidStatusTransition,
}

/// Deposit request
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
    pub source: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

/// Withdrawal request
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub destination: Option<String>,
    pub pin: Option<String>,
    pub description: Option<String>,
}

/// Transfer request
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub recipient_id: Option<Uuid>,
    pub amount: Decimal,
    pub pin: Option<String>,
    pub description: Option<String>,
}

/// Set/change PIN request
#[derive(Debug, Deserialize, Validate)]
pub struct SetPinRequest {
    #[validate(length(min = 4, max = 6))]
    pub pin: String,
    pub current_pin: Option<String>,
}

/// Verify PIN request
#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub pin: String,
}

/// Update limits request
#[derive(Debug, Deserialize)]
pub struct UpdateLimitsRequest {
    pub daily_limit: Option<Decimal>,
    pub per_transaction_limit: Option<Decimal>,
}

/// Link external payment account request
#[derive(Debug, Deserialize, Validate)]
pub struct LinkAccountRequest {
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(length(min = 1))]
    pub account_ref: String,
    pub label: Option<String>,
}

/// Wallet summary returned by `GET /api/wallet/:user_id`
#[derive(Debug, Serialize)]
pub struct WalletSummary {
    pub balance: Decimal,
    pub currency: String,
    pub today_spent: Decimal,
    pub daily_limit: Decimal,
    pub available_today: Decimal,
}

impl From<&Wallet> for WalletSummary {
    fn from(wallet: &Wallet) -> Self {
        let available = (wallet.daily_limit - wallet.today_spent).max(Decimal::ZERO);
        Self {
            balance: wallet.balance,
            currency: wallet.currency.clone(),
            today_spent: wallet.today_spent,
            daily_limit: wallet.daily_limit,
            available_today: available,
        }
    }
}

/// Result of a successful transfer
#[derive(Debug)]
pub struct TransferOutcome {
    pub sender_wallet: Wallet,
    pub recipient_wallet: Wallet,
    pub sender_entry: FinancialTransaction,
    pub recipient_entry: FinancialTransaction,
}

/// Realtime events pushed to a wallet owner's private channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WalletEvent {
    WalletUpdated {
        user_id: Uuid,
        balance: Decimal,
        transaction: FinancialTransaction,
        #[serde(rename = "type")]
        kind: WalletUpdateKind,
    },
    PaymentSuccess {
        user_id: Uuid,
        transaction: FinancialTransaction,
    },
    PaymentFailed {
        user_id: Uuid,
        transaction: FinancialTransaction,
    },
}

/// Direction tag carried on `wallet_updated` events
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletUpdateKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

/// Wallet service
pub struct WalletService {
    pool: Arc<PgPool>,
    default_currency: String,
}

impl WalletService {
    /// Create a new wallet service
    pub fn new(pool: Arc<PgPool>, default_currency: String) -> Self {
        Self {
            pool,
            default_currency,
        }
    }

    /// Get the wallet for a user, creating it on first access.
    ///
    /// Always applies the lazy daily-limit reset before returning: the first
    /// touch after UTC midnight zeroes `today_spent` exactly once.
    pub async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, WalletError> {
        sqlx::query(
            "INSERT INTO wallets (user_id, currency) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(&self.default_currency)
        .execute(&*self.pool)
        .await?;

        // The date guard in the WHERE clause makes the reset idempotent
        // within a calendar day even under concurrent callers.
        sqlx::query(
            r#"
            UPDATE wallets
            SET today_spent = 0, last_reset_date = NOW(), updated_at = NOW()
            WHERE user_id = $1
              AND (last_reset_date AT TIME ZONE 'UTC')::date < (NOW() AT TIME ZONE 'UTC')::date
            "#,
        )
        .bind(user_id)
        .execute(&*self.pool)
        .await?;

        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&*self.pool)
            .await?;

        Ok(wallet)
    }

    /// Balance/limit summary for the wallet owner
    pub async fn summary(&self, user_id: Uuid) -> Result<WalletSummary, WalletError> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        Ok(WalletSummary::from(&wallet))
    }

    /// Credit the wallet.
    ///
    /// Deposits have no upper bound; the only rejection is a non-positive
    /// amount. Writes one `income`/`wallet_deposit` ledger entry in the same
    /// transaction as the balance change.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        req: DepositRequest,
    ) -> Result<(Wallet, FinancialTransaction), WalletError> {
        if req.amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        self.get_or_create_wallet(user_id).await?;

        let source = req.source.unwrap_or_else(|| "manual".to_string());
        let description = req
            .description
            .unwrap_or_else(|| format!("Wallet deposit via {}", source));

        let mut tx = self.pool.begin().await?;

        let wallet = apply_credit(&mut tx, user_id, req.amount).await?;
        let entry = insert_ledger_entry(
            &mut tx,
            user_id,
            &description,
            req.amount,
            LedgerEntryType::Income,
            TransactionCategory::WalletDeposit,
            TransactionStatus::Completed,
            req.reference.as_deref(),
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%user_id, amount = %req.amount, "wallet deposit completed");
        Ok((wallet, entry))
    }

    /// Debit the wallet.
    ///
    /// Policy guards run in a fixed order after the daily reset: frozen,
    /// inactive, per-transaction limit, daily limit, then balance. The two
    /// limit guards are independent of balance sufficiency.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        req: WithdrawRequest,
    ) -> Result<(Wallet, FinancialTransaction), WalletError> {
        if req.amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        let wallet = self.get_or_create_wallet(user_id).await?;
        check_pin_gate(&wallet, req.pin.as_deref())?;

        let destination = req.destination.unwrap_or_else(|| "cash".to_string());
        let description = req
            .description
            .unwrap_or_else(|| format!("Wallet withdrawal to {}", destination));

        let mut tx = self.pool.begin().await?;

        let mut wallet = lock_wallet(&mut tx, user_id)
            .await?
            .ok_or(WalletError::NotFound)?;
        reset_daily_if_needed(&mut tx, &mut wallet).await?;
        check_debit_policy(&wallet, req.amount)?;

        let wallet = apply_debit(&mut tx, user_id, req.amount).await?;
        let entry = insert_ledger_entry(
            &mut tx,
            user_id,
            &description,
            req.amount,
            LedgerEntryType::Expense,
            TransactionCategory::WalletWithdrawal,
            TransactionStatus::Completed,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%user_id, amount = %req.amount, "wallet withdrawal completed");
        Ok((wallet, entry))
    }

    /// Move funds between two wallets.
    ///
    /// Debit guards run against the sender; the recipient wallet is created
    /// on demand. Both balance changes and both ledger entries commit in one
    /// database transaction, so a failed credit rolls the debit back. Rows
    /// are locked in ascending user-id order so two opposing transfers
    /// cannot deadlock.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        pin: Option<&str>,
        description: Option<String>,
    ) -> Result<TransferOutcome, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        if sender_id == recipient_id {
            return Err(WalletError::MissingRecipient);
        }

        let sender = self.get_or_create_wallet(sender_id).await?;
        check_pin_gate(&sender, pin)?;
        self.get_or_create_wallet(recipient_id).await?;

        let mut tx = self.pool.begin().await?;

        let (first, second) = if sender_id < recipient_id {
            (sender_id, recipient_id)
        } else {
            (recipient_id, sender_id)
        };
        let first_wallet = lock_wallet(&mut tx, first)
            .await?
            .ok_or(WalletError::NotFound)?;
        let second_wallet = lock_wallet(&mut tx, second)
            .await?
            .ok_or(WalletError::NotFound)?;
        let mut sender_wallet = if first_wallet.user_id == sender_id {
            first_wallet
        } else {
            second_wallet
        };

        reset_daily_if_needed(&mut tx, &mut sender_wallet).await?;
        check_debit_policy(&sender_wallet, amount)?;

        let sender_wallet = apply_debit(&mut tx, sender_id, amount).await?;
        let recipient_wallet = apply_credit(&mut tx, recipient_id, amount).await?;

        let sender_description =
            description.unwrap_or_else(|| "Wallet transfer sent".to_string());
        let sender_entry = insert_ledger_entry(
            &mut tx,
            sender_id,
            &sender_description,
            amount,
            LedgerEntryType::Expense,
            TransactionCategory::WalletTransfer,
            TransactionStatus::Completed,
            None,
            Some(&format!("transfer to {}", recipient_id)),
        )
        .await?;
        let recipient_entry = insert_ledger_entry(
            &mut tx,
            recipient_id,
            "Wallet transfer received",
            amount,
            LedgerEntryType::Income,
            TransactionCategory::WalletTransfer,
            TransactionStatus::Completed,
            None,
            Some(&format!("transfer from {}", sender_id)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%sender_id, %recipient_id, amount = %amount, "wallet transfer completed");
        Ok(TransferOutcome {
            sender_wallet,
            recipient_wallet,
            sender_entry,
            recipient_entry,
        })
    }

    /// Set or change the transaction PIN.
    ///
    /// The PIN is stored bcrypt-hashed and never read back. Changing an
    /// existing PIN requires presenting the current one.
    pub async fn set_pin(
        &self,
        user_id: Uuid,
        new_pin: &str,
        current_pin: Option<&str>,
    ) -> Result<(), WalletError> {
        if new_pin.len() < 4 || new_pin.len() > 6 || !new_pin.chars().all(|c| c.is_ascii_digit())
        {
            return Err(WalletError::PinFormat);
        }

        let wallet = self.get_or_create_wallet(user_id).await?;
        if wallet.pin_hash.is_some() {
            check_pin_gate(&wallet, current_pin)?;
        }

        let hash = bcrypt::hash(new_pin, bcrypt::DEFAULT_COST)?;
        sqlx::query("UPDATE wallets SET pin_hash = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(hash)
            .bind(user_id)
            .execute(&*self.pool)
            .await?;

        tracing::info!(%user_id, "wallet PIN updated");
        Ok(())
    }

    /// Compare a candidate PIN against the stored hash.
    ///
    /// A wallet with no PIN set verifies nothing.
    pub async fn verify_pin(&self, user_id: Uuid, pin: &str) -> Result<bool, WalletError> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        match &wallet.pin_hash {
            Some(hash) => Ok(bcrypt::verify(pin, hash)?),
            None => Ok(false),
        }
    }

    /// Current spending limits
    pub async fn limits(&self, user_id: Uuid) -> Result<(Decimal, Decimal), WalletError> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        Ok((wallet.daily_limit, wallet.per_transaction_limit))
    }

    /// Update one or both spending limits.
    ///
    /// `today_spent` is left untouched; a lowered daily limit takes effect
    /// against spend already accumulated today.
    pub async fn update_limits(
        &self,
        user_id: Uuid,
        daily_limit: Option<Decimal>,
        per_transaction_limit: Option<Decimal>,
    ) -> Result<Wallet, WalletError> {
        for limit in [daily_limit, per_transaction_limit].into_iter().flatten() {
            if limit <= Decimal::ZERO {
                return Err(WalletError::InvalidLimit);
            }
        }
        self.get_or_create_wallet(user_id).await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET daily_limit = COALESCE($1, daily_limit),
                per_transaction_limit = COALESCE($2, per_transaction_limit),
                updated_at = NOW()
            WHERE user_id = $3
            RETURNING *
            "#,
        )
        .bind(daily_limit)
        .bind(per_transaction_limit)
        .bind(user_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(wallet)
    }

    /// Connect an external payment account to the wallet
    pub async fn link_account(
        &self,
        user_id: Uuid,
        account: LinkedAccount,
    ) -> Result<Wallet, WalletError> {
        self.get_or_create_wallet(user_id).await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET linked_accounts = linked_accounts || $1, updated_at = NOW()
            WHERE user_id = $2
            RETURNING *
            "#,
        )
        .bind(sqlx::types::Json(account))
        .bind(user_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(wallet)
    }

    /// Ledger statement for a user, newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FinancialTransaction>, WalletError> {
        let entries = sqlx::query_as::<_, FinancialTransaction>(
            r#"
            SELECT * FROM financial_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(entries)
    }

    /// Advance a pending ledger entry to a terminal status.
    ///
    /// Driven by asynchronous payment-gateway callbacks; entries are
    /// otherwise immutable, and a finalized entry cannot transition again.
    pub async fn update_transaction_status(
        &self,
        reference: &str,
        status: TransactionStatus,
    ) -> Result<FinancialTransaction, WalletError> {
        if status == TransactionStatus::Pending {
            return Err(WalletError::InvalidStatusTransition);
        }

        let entry = sqlx::query_as::<_, FinancialTransaction>(
            r#"
            UPDATE financial_transactions
            SET status = $1
            WHERE reference = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(reference)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or(WalletError::EntryNotFound)?;

        tracing::info!(reference, status = ?entry.status, "ledger entry finalized");
        Ok(entry)
    }
}

async fn lock_wallet(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
}

/// Zero `today_spent` on the locked row if the UTC day has rolled over since
/// the last reset. Idempotent within a calendar day.
async fn reset_daily_if_needed(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &mut Wallet,
) -> Result<(), sqlx::Error> {
    if !day_rolled(wallet.last_reset_date, Utc::now()) {
        return Ok(());
    }
    let updated = sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET today_spent = 0, last_reset_date = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(wallet.id)
    .fetch_one(&mut **tx)
    .await?;
    *wallet = updated;
    Ok(())
}

/// Calendar-day comparison for the daily reset, on UTC dates
fn day_rolled(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last_reset.date_naive() < now.date_naive()
}

/// Ordered debit guards. The limit checks are policy, evaluated before
/// balance sufficiency.
fn check_debit_policy(wallet: &Wallet, amount: Decimal) -> Result<(), WalletError> {
    if wallet.is_frozen {
        return Err(WalletError::WalletFrozen);
    }
    if !wallet.is_active {
        return Err(WalletError::WalletInactive);
    }
    if amount > wallet.per_transaction_limit {
        return Err(WalletError::ExceedsPerTransactionLimit);
    }
    if wallet.today_spent + amount > wallet.daily_limit {
        return Err(WalletError::ExceedsDailyLimit);
    }
    if amount > wallet.balance {
        return Err(WalletError::InsufficientBalance);
    }
    Ok(())
}

fn check_pin_gate(wallet: &Wallet, pin: Option<&str>) -> Result<(), WalletError> {
    let Some(hash) = &wallet.pin_hash else {
        return Ok(());
    };
    let pin = pin.ok_or(WalletError::PinRequired)?;
    if bcrypt::verify(pin, hash)? {
        Ok(())
    } else {
        Err(WalletError::InvalidPin)
    }
}

async fn apply_credit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: Decimal,
) -> Result<Wallet, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = balance + $1,
            total_deposits = total_deposits + $1,
            total_transactions = total_transactions + 1,
            last_transaction_date = NOW(),
            updated_at = NOW()
        WHERE user_id = $2
        RETURNING *
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
}

async fn apply_debit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: Decimal,
) -> Result<Wallet, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = balance - $1,
            today_spent = today_spent + $1,
            total_withdrawals = total_withdrawals + $1,
            total_transactions = total_transactions + 1,
            last_transaction_date = NOW(),
            updated_at = NOW()
        WHERE user_id = $2
        RETURNING *
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
}

#[allow(clippy::too_many_arguments)]
async fn insert_ledger_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    description: &str,
    amount: Decimal,
    entry_type: LedgerEntryType,
    category: TransactionCategory,
    status: TransactionStatus,
    reference: Option<&str>,
    notes: Option<&str>,
) -> Result<FinancialTransaction, sqlx::Error> {
    sqlx::query_as::<_, FinancialTransaction>(
        r#"
        INSERT INTO financial_transactions
            (user_id, description, amount, entry_type, category, status, reference, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(description)
    .bind(amount)
    .bind(entry_type)
    .bind(category)
    .bind(status)
    .bind(reference)
    .bind(notes)
    .fetch_one(&mut **tx)
    .await
}
