//! Wallet ledger integration tests

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use omnibiz_server::models::{LedgerEntryType, LinkedAccount, TransactionStatus};
use omnibiz_server::wallet::{DepositRequest, WalletError, WalletService, WithdrawRequest};

fn service(pool: &PgPool) -> WalletService {
    WalletService::new(Arc::new(pool.clone()), "KES".to_string())
}

fn deposit_req(amount: Decimal) -> DepositRequest {
    DepositRequest {
        amount,
        source: None,
        reference: None,
        description: None,
    }
}

fn withdraw_req(amount: Decimal) -> WithdrawRequest {
    WithdrawRequest {
        amount,
        destination: None,
        pin: None,
        description: None,
    }
}

async fn ledger_count(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM financial_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
async fn wallet_is_created_lazily_and_reused(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    let first = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(first.balance, Decimal::ZERO);
    assert_eq!(first.currency, "KES");
    assert!(first.is_active);
    assert!(!first.is_frozen);

    let second = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(second.id, first.id);
}

#[sqlx::test]
async fn deposit_increases_balance_and_writes_income_entry(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    let (wallet, entry) = wallets.deposit(user, deposit_req(dec!(600))).await.unwrap();

    assert_eq!(wallet.balance, dec!(600));
    assert_eq!(wallet.total_deposits, dec!(600));
    assert_eq!(wallet.total_transactions, 1);
    assert!(wallet.last_transaction_date.is_some());

    assert_eq!(entry.amount, dec!(600));
    assert_eq!(entry.entry_type, LedgerEntryType::Income);
    assert_eq!(entry.status, TransactionStatus::Completed);
    assert_eq!(ledger_count(&pool, user).await, 1);
}

#[sqlx::test]
async fn non_positive_amounts_are_rejected(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    assert!(matches!(
        wallets.deposit(user, deposit_req(Decimal::ZERO)).await,
        Err(WalletError::InvalidAmount)
    ));
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(-5))).await,
        Err(WalletError::InvalidAmount)
    ));
    assert_eq!(ledger_count(&pool, user).await, 0);
}

#[sqlx::test]
async fn withdrawal_moves_balance_and_today_spent_together(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    wallets.deposit(user, deposit_req(dec!(1000))).await.unwrap();
    let (wallet, entry) = wallets.withdraw(user, withdraw_req(dec!(250))).await.unwrap();

    assert_eq!(wallet.balance, dec!(750));
    assert_eq!(wallet.today_spent, dec!(250));
    assert_eq!(wallet.total_withdrawals, dec!(250));
    assert_eq!(entry.entry_type, LedgerEntryType::Expense);
    assert_eq!(entry.amount, dec!(250));
    // One entry for the deposit, one for the withdrawal.
    assert_eq!(ledger_count(&pool, user).await, 2);
}

#[sqlx::test]
async fn insufficient_balance_fires_after_the_limit_guards(pool: PgPool) {
    // Spec scenario: start at 0, daily 1000, per-transaction 500.
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.get_or_create_wallet(user).await.unwrap();
    wallets
        .update_limits(user, Some(dec!(1000)), Some(dec!(500)))
        .await
        .unwrap();

    wallets.deposit(user, deposit_req(dec!(600))).await.unwrap();
    let (wallet, _) = wallets.withdraw(user, withdraw_req(dec!(500))).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));
    assert_eq!(wallet.today_spent, dec!(500));

    // 500 passes both limit guards (500 <= 500, 500 + 500 <= 1000) but
    // exceeds the remaining balance of 100.
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(500))).await,
        Err(WalletError::InsufficientBalance)
    ));

    let wallet = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));
    assert_eq!(wallet.today_spent, dec!(500));
}

#[sqlx::test]
async fn per_transaction_limit_rejects_regardless_of_balance(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(1_000_000))).await.unwrap();
    wallets
        .update_limits(user, Some(dec!(100_000)), Some(dec!(500)))
        .await
        .unwrap();

    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(501))).await,
        Err(WalletError::ExceedsPerTransactionLimit)
    ));
}

#[sqlx::test]
async fn daily_limit_rejects_once_cumulative_spend_would_exceed_it(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(10_000))).await.unwrap();
    wallets
        .update_limits(user, Some(dec!(1000)), Some(dec!(600)))
        .await
        .unwrap();

    wallets.withdraw(user, withdraw_req(dec!(600))).await.unwrap();
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(500))).await,
        Err(WalletError::ExceedsDailyLimit)
    ));

    // Still allowed up to the cap.
    let (wallet, _) = wallets.withdraw(user, withdraw_req(dec!(400))).await.unwrap();
    assert_eq!(wallet.today_spent, dec!(1000));
}

#[sqlx::test]
async fn frozen_and_inactive_wallets_reject_debits(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(100))).await.unwrap();

    sqlx::query("UPDATE wallets SET is_frozen = TRUE WHERE user_id = $1")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(10))).await,
        Err(WalletError::WalletFrozen)
    ));

    sqlx::query("UPDATE wallets SET is_frozen = FALSE, is_active = FALSE WHERE user_id = $1")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(10))).await,
        Err(WalletError::WalletInactive)
    ));

    // A frozen wallet still accepts credits.
    sqlx::query("UPDATE wallets SET is_frozen = TRUE, is_active = TRUE WHERE user_id = $1")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();
    let (wallet, _) = wallets.deposit(user, deposit_req(dec!(50))).await.unwrap();
    assert_eq!(wallet.balance, dec!(150));
}

#[sqlx::test]
async fn daily_reset_zeroes_today_spent_exactly_once(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(1000))).await.unwrap();
    wallets.withdraw(user, withdraw_req(dec!(300))).await.unwrap();

    // Within the same day the reset check is a no-op.
    let wallet = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(wallet.today_spent, dec!(300));

    // Roll the clock back a day; the next touch resets the counter.
    sqlx::query("UPDATE wallets SET last_reset_date = NOW() - INTERVAL '1 day' WHERE user_id = $1")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();

    let wallet = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(wallet.today_spent, Decimal::ZERO);

    // Idempotent: a second check the same day changes nothing further.
    wallets.withdraw(user, withdraw_req(dec!(100))).await.unwrap();
    let wallet = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(wallet.today_spent, dec!(100));
}

#[sqlx::test]
async fn transfer_moves_funds_and_writes_one_entry_per_party(pool: PgPool) {
    let wallets = service(&pool);
    let sender = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    wallets.deposit(sender, deposit_req(dec!(500))).await.unwrap();

    let outcome = wallets
        .transfer(sender, recipient, dec!(200), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.sender_wallet.balance, dec!(300));
    assert_eq!(outcome.recipient_wallet.balance, dec!(200));
    assert_eq!(outcome.sender_entry.entry_type, LedgerEntryType::Expense);
    assert_eq!(outcome.recipient_entry.entry_type, LedgerEntryType::Income);
    assert_eq!(outcome.sender_entry.amount, dec!(200));
    assert_eq!(outcome.recipient_entry.amount, dec!(200));

    assert_eq!(ledger_count(&pool, sender).await, 2);
    assert_eq!(ledger_count(&pool, recipient).await, 1);
}

#[sqlx::test]
async fn failed_transfer_leaves_both_wallets_untouched(pool: PgPool) {
    let wallets = service(&pool);
    let sender = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    wallets.deposit(sender, deposit_req(dec!(100))).await.unwrap();

    assert!(matches!(
        wallets.transfer(sender, recipient, dec!(500), None, None).await,
        Err(WalletError::InsufficientBalance)
    ));

    let sender_wallet = wallets.get_or_create_wallet(sender).await.unwrap();
    let recipient_wallet = wallets.get_or_create_wallet(recipient).await.unwrap();
    assert_eq!(sender_wallet.balance, dec!(100));
    assert_eq!(recipient_wallet.balance, Decimal::ZERO);
    // Only the initial deposit is on the ledger; no transfer entries.
    assert_eq!(ledger_count(&pool, sender).await, 1);
    assert_eq!(ledger_count(&pool, recipient).await, 0);
}

#[sqlx::test]
async fn transfer_to_self_is_rejected(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(100))).await.unwrap();

    assert!(matches!(
        wallets.transfer(user, user, dec!(10), None, None).await,
        Err(WalletError::MissingRecipient)
    ));
}

#[sqlx::test]
async fn pin_gates_withdrawals_and_transfers(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(1000))).await.unwrap();
    wallets.set_pin(user, "1234", None).await.unwrap();

    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(10))).await,
        Err(WalletError::PinRequired)
    ));

    let mut with_wrong_pin = withdraw_req(dec!(10));
    with_wrong_pin.pin = Some("9999".to_string());
    assert!(matches!(
        wallets.withdraw(user, with_wrong_pin).await,
        Err(WalletError::InvalidPin)
    ));

    let mut with_pin = withdraw_req(dec!(10));
    with_pin.pin = Some("1234".to_string());
    assert!(wallets.withdraw(user, with_pin).await.is_ok());

    assert!(matches!(
        wallets.transfer(user, other, dec!(10), None, None).await,
        Err(WalletError::PinRequired)
    ));
    assert!(wallets
        .transfer(user, other, dec!(10), Some("1234"), None)
        .await
        .is_ok());
}

#[sqlx::test]
async fn changing_a_pin_requires_the_current_one(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.set_pin(user, "1234", None).await.unwrap();

    assert!(matches!(
        wallets.set_pin(user, "5678", None).await,
        Err(WalletError::PinRequired)
    ));
    assert!(matches!(
        wallets.set_pin(user, "5678", Some("0000")).await,
        Err(WalletError::InvalidPin)
    ));

    wallets.set_pin(user, "5678", Some("1234")).await.unwrap();
    assert!(wallets.verify_pin(user, "5678").await.unwrap());
    assert!(!wallets.verify_pin(user, "1234").await.unwrap());
}

#[sqlx::test]
async fn pin_must_be_four_to_six_digits(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    assert!(matches!(
        wallets.set_pin(user, "12", None).await,
        Err(WalletError::PinFormat)
    ));
    assert!(matches!(
        wallets.set_pin(user, "abcd", None).await,
        Err(WalletError::PinFormat)
    ));

    // A wallet with no PIN set verifies nothing.
    assert!(!wallets.verify_pin(user, "1234").await.unwrap());
}

#[sqlx::test]
async fn limits_must_stay_positive_and_apply_immediately(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(10_000))).await.unwrap();

    assert!(matches!(
        wallets.update_limits(user, Some(Decimal::ZERO), None).await,
        Err(WalletError::InvalidLimit)
    ));

    wallets
        .update_limits(user, Some(dec!(1000)), Some(dec!(800)))
        .await
        .unwrap();
    wallets.withdraw(user, withdraw_req(dec!(800))).await.unwrap();

    // Lowering the daily limit below today's spend blocks further debits
    // without touching the accumulated counter.
    wallets.update_limits(user, Some(dec!(500)), None).await.unwrap();
    assert!(matches!(
        wallets.withdraw(user, withdraw_req(dec!(1))).await,
        Err(WalletError::ExceedsDailyLimit)
    ));
    let wallet = wallets.get_or_create_wallet(user).await.unwrap();
    assert_eq!(wallet.today_spent, dec!(800));
}

#[sqlx::test]
async fn summary_reports_remaining_daily_allowance(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(5000))).await.unwrap();
    wallets
        .update_limits(user, Some(dec!(1000)), Some(dec!(1000)))
        .await
        .unwrap();
    wallets.withdraw(user, withdraw_req(dec!(400))).await.unwrap();

    let summary = wallets.summary(user).await.unwrap();
    assert_eq!(summary.balance, dec!(4600));
    assert_eq!(summary.today_spent, dec!(400));
    assert_eq!(summary.available_today, dec!(600));
}

#[sqlx::test]
async fn gateway_callback_finalizes_a_pending_entry_once(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO financial_transactions
            (user_id, description, amount, entry_type, category, status, reference)
        VALUES ($1, 'STK push', 150.00, 'income', 'mpesa_payment', 'pending', 'mpesa-ref-1')
        "#,
    )
    .bind(user)
    .execute(&pool)
    .await
    .unwrap();

    let entry = wallets
        .update_transaction_status("mpesa-ref-1", TransactionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(entry.status, TransactionStatus::Completed);

    // Terminal entries cannot transition again.
    assert!(matches!(
        wallets
            .update_transaction_status("mpesa-ref-1", TransactionStatus::Failed)
            .await,
        Err(WalletError::EntryNotFound)
    ));
    // And pending is not a valid target.
    assert!(matches!(
        wallets
            .update_transaction_status("mpesa-ref-1", TransactionStatus::Pending)
            .await,
        Err(WalletError::InvalidStatusTransition)
    ));
}

#[sqlx::test]
async fn linked_accounts_accumulate(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();

    wallets
        .link_account(
            user,
            LinkedAccount {
                provider: "mpesa".to_string(),
                account_ref: "254700000001".to_string(),
                label: Some("Personal".to_string()),
            },
        )
        .await
        .unwrap();
    let wallet = wallets
        .link_account(
            user,
            LinkedAccount {
                provider: "paypal".to_string(),
                account_ref: "owner@example.com".to_string(),
                label: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(wallet.linked_accounts.len(), 2);
    assert_eq!(wallet.linked_accounts[0].provider, "mpesa");
    assert_eq!(wallet.linked_accounts[1].provider, "paypal");
}

#[sqlx::test]
async fn statement_lists_entries_newest_first(pool: PgPool) {
    let wallets = service(&pool);
    let user = Uuid::new_v4();
    wallets.deposit(user, deposit_req(dec!(100))).await.unwrap();
    wallets.deposit(user, deposit_req(dec!(200))).await.unwrap();
    wallets.withdraw(user, withdraw_req(dec!(50))).await.unwrap();

    let entries = wallets.list_transactions(user, 10, 0).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].amount, dec!(50));
    assert_eq!(entries[0].entry_type, LedgerEntryType::Expense);

    let paged = wallets.list_transactions(user, 2, 2).await.unwrap();
    assert_eq!(paged.len(), 1);
}
