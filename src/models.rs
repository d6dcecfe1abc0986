//! Data models for the OmniBiz backend

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

/// Per-user wallet with balance, spend-limit policy and PIN state
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub daily_limit: Decimal,
    pub per_transaction_limit: Decimal,
    pub today_spent: Decimal,
    pub last_reset_date: DateTime<Utc>,
    pub linked_accounts: Json<Vec<LinkedAccount>>,
    #[serde(skip_serializing, default)]
    pub pin_hash: Option<String>,
    pub is_active: bool,
    pub is_frozen: bool,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_transactions: i64,
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connected external payment account (M-Pesa, PayPal, bank)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LinkedAccount {
    pub provider: String,
    pub account_ref: String,
    pub label: Option<String>,
}

/// Immutable ledger entry recording a single financial movement
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct FinancialTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub entry_type: LedgerEntryType,
    pub category: TransactionCategory,
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Direction of a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    Income,
    Expense,
}

/// Ledger entry categories
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    WalletDeposit,
    WalletWithdrawal,
    WalletTransfer,
    MpesaPayment,
    Sales,
}

/// Ledger entry status; completed/cancelled/failed are terminal
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

/// Unique channel between one business owner and one customer
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub business_owner_id: Uuid,
    pub customer_id: Uuid,
    pub business_owner_name: String,
    pub customer_name: String,
    pub customer_contact: Option<String>,
    pub last_message: Option<String>,
    pub last_message_sender_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub owner_unread: i32,
    pub customer_unread: i32,
    pub status: ConversationStatus,
    pub priority: ConversationPriority,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the given user is one of the two parties
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.business_owner_id == user_id || self.customer_id == user_id
    }

    /// Unread counter belonging to the given party
    pub fn unread_for(&self, user_id: Uuid) -> i32 {
        if self.business_owner_id == user_id {
            self.owner_unread
        } else {
            self.customer_unread
        }
    }

    /// Display name of the other party
    pub fn counterpart_name(&self, user_id: Uuid) -> &str {
        if self.business_owner_id == user_id {
            &self.customer_name
        } else {
            &self.business_owner_name
        }
    }
}

/// Conversation status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "conversation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Blocked,
}

/// Conversation priority
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "conversation_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationPriority {
    Low,
    Normal,
    High,
}

/// Chat message within a conversation
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_kind: SenderKind,
    pub sender_name: String,
    pub content: String,
    pub attachments: Json<Vec<Attachment>>,
    pub status: MessageStatus,
    pub read_by: Json<Vec<ReadReceipt>>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether the given reader already has a receipt on this message
    pub fn read_by_user(&self, reader_id: Uuid) -> bool {
        self.read_by.iter().any(|r| r.reader_id == reader_id)
    }
}

/// Which side of the conversation a message came from
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "sender_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    BusinessOwner,
    Customer,
}

/// Message delivery status.
///
/// `Delivered` is reachable only via external transport acknowledgement;
/// no server code path sets it. `Failed` is the transport collaborator's.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Proof that a specific party has seen a specific message
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReadReceipt {
    pub reader_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Message attachment metadata
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachment {
    pub url: String,
    pub kind: String,
    pub name: String,
    pub size: i64,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
