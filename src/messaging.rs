//! Messaging store for the OmniBiz backend
//!
//! Owns conversations (one per business-owner/customer pair) and the ordered
//! messages within them, including per-party unread counters and idempotent
//! read receipts. Counter bookkeeping and receipt appends are expressed as
//! single conditional updates, never read-then-write pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Attachment, Conversation, ConversationStatus, Message, SenderKind};

/// Longest message content accepted, in characters
pub const MAX_CONTENT_LEN: usize = 2000;

/// Messaging service error
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Conversation not found")]
    NotFound,
    #[error("Message not found")]
    MessageNotFound,
    #[error("Not a participant of this conversation")]
    Forbidden,
    #[error("Message content cannot be empty")]
    EmptyContent,
    #[error("Message content is too long")]
    ContentTooLong,
}

/// Start-conversation request
#[derive(Debug, Deserialize, Validate)]
pub struct StartConversationRequest {
    pub business_owner_id: Uuid,
    pub customer_id: Uuid,
    #[validate(length(min = 1))]
    pub business_owner_name: String,
    #[validate(length(min = 1))]
    pub customer_name: String,
    pub customer_contact: Option<String>,
}

/// Send-message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    #[validate(length(max = 2000))]
    pub content: String,
    pub attachments: Option<Vec<Attachment>>,
}

/// Response for conversation creation (idempotent)
#[derive(Debug, Serialize)]
pub struct ConversationCreated {
    pub id: Uuid,
    pub is_new: bool,
}

/// One row of a user's conversation list
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub counterpart_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub status: ConversationStatus,
}

/// Realtime events pushed to a conversation party's private channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MessageEvent {
    MessageReceived {
        conversation_id: Uuid,
        message: Message,
    },
    ConversationUpdated {
        conversation_id: Uuid,
        status: ConversationStatus,
    },
}

/// Messaging service
pub struct MessagingService {
    pool: Arc<PgPool>,
}

impl MessagingService {
    /// Create a new messaging service
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Return the conversation for the pair, creating it if absent.
    ///
    /// Idempotent: the unique constraint on the pair guarantees at most one
    /// conversation even under concurrent first messages.
    pub async fn find_or_create_conversation(
        &self,
        req: StartConversationRequest,
    ) -> Result<(Conversation, bool), MessagingError> {
        if let Some(existing) = self
            .conversation_for_pair(req.business_owner_id, req.customer_id)
            .await?
        {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations
                (business_owner_id, customer_id, business_owner_name, customer_name, customer_contact)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (business_owner_id, customer_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(req.business_owner_id)
        .bind(req.customer_id)
        .bind(&req.business_owner_name)
        .bind(&req.customer_name)
        .bind(&req.customer_contact)
        .fetch_optional(&*self.pool)
        .await?;

        match inserted {
            Some(conversation) => {
                tracing::info!(conversation_id = %conversation.id, "conversation created");
                Ok((conversation, true))
            }
            // Lost a creation race; the other insert won.
            None => {
                let existing = self
                    .conversation_for_pair(req.business_owner_id, req.customer_id)
                    .await?
                    .ok_or(MessagingError::NotFound)?;
                Ok((existing, false))
            }
        }
    }

    /// Get a conversation by id
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, MessagingError> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&*self.pool)
                .await?;
        Ok(conversation)
    }

    /// Conversations the user takes part in, newest activity first
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE business_owner_id = $1 OR customer_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        let summaries = conversations
            .into_iter()
            .map(|c| ConversationSummary {
                counterpart_name: c.counterpart_name(user_id).to_string(),
                unread_count: c.unread_for(user_id),
                id: c.id,
                last_message: c.last_message,
                last_message_at: c.last_message_at,
                status: c.status,
            })
            .collect();

        Ok(summaries)
    }

    /// Append a message to a conversation.
    ///
    /// The conversation row is locked for the duration, so the lastMessage
    /// snapshot and the counterpart's unread counter move together with the
    /// insert. Sending to an archived conversation reactivates it; a blocked
    /// conversation rejects the send.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        req: SendMessageRequest,
    ) -> Result<Message, MessagingError> {
        let content = normalize_content(&req.content)?;
        let attachments = req.attachments.unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MessagingError::NotFound)?;

        let (sender_kind, sender_name) = if req.sender_id == conversation.business_owner_id {
            (
                SenderKind::BusinessOwner,
                conversation.business_owner_name.clone(),
            )
        } else if req.sender_id == conversation.customer_id {
            (SenderKind::Customer, conversation.customer_name.clone())
        } else {
            return Err(MessagingError::Forbidden);
        };
        if conversation.status == ConversationStatus::Blocked {
            return Err(MessagingError::Forbidden);
        }

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (conversation_id, sender_id, sender_kind, sender_name, content, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(req.sender_id)
        .bind(sender_kind)
        .bind(&sender_name)
        .bind(&content)
        .bind(sqlx::types::Json(attachments))
        .fetch_one(&mut *tx)
        .await?;

        // Snapshot + counterpart unread counter; the sender's own counter
        // never moves on send.
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $1,
                last_message_sender_id = $2,
                last_message_at = $3,
                owner_unread = owner_unread + CASE WHEN business_owner_id = $2 THEN 0 ELSE 1 END,
                customer_unread = customer_unread + CASE WHEN customer_id = $2 THEN 0 ELSE 1 END,
                status = CASE WHEN status = 'archived' THEN 'active'::conversation_status ELSE status END,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&content)
        .bind(req.sender_id)
        .bind(message.created_at)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%conversation_id, message_id = %message.id, "message sent");
        Ok(message)
    }

    /// Ordered message history for a participant.
    ///
    /// Fetching the history implicitly acknowledges it: the conversation is
    /// marked read for the requester before the rows are returned.
    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Vec<Message>, MessagingError> {
        let conversation = self
            .get_conversation(conversation_id)
            .await?
            .ok_or(MessagingError::NotFound)?;
        if !conversation.is_participant(requester_id) {
            return Err(MessagingError::Forbidden);
        }

        self.mark_conversation_read(conversation_id, requester_id)
            .await?;

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1 AND NOT deleted
            ORDER BY created_at, id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(messages)
    }

    /// Mark every counterpart message in the conversation as read by the
    /// reader and zero the reader's unread counter.
    ///
    /// Idempotent: the JSONB containment guard skips messages the reader has
    /// already receipted, and re-zeroing a zero counter is a no-op. Only the
    /// reader's own counter is touched.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<(), MessagingError> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MessagingError::NotFound)?;
        if !conversation.is_participant(reader_id) {
            return Err(MessagingError::Forbidden);
        }

        sqlx::query(
            r#"
            UPDATE messages
            SET read_by = read_by
                    || jsonb_build_array(jsonb_build_object('reader_id', $2::uuid, 'read_at', NOW())),
                status = 'read'
            WHERE conversation_id = $1
              AND sender_id <> $2
              AND NOT deleted
              AND NOT (read_by @> jsonb_build_array(jsonb_build_object('reader_id', $2::uuid)))
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE conversations
            SET owner_unread = CASE WHEN business_owner_id = $2 THEN 0 ELSE owner_unread END,
                customer_unread = CASE WHEN customer_id = $2 THEN 0 ELSE customer_unread END
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Add a read receipt to a single message.
    ///
    /// A sender "reading" their own message is a silent no-op. The receipt
    /// append is a single conditional update guarded by JSONB containment,
    /// so re-marking by the same reader leaves exactly one entry.
    pub async fn mark_message_read(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> Result<Message, MessagingError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(MessagingError::MessageNotFound)?;

        if message.sender_id == reader_id {
            return Ok(message);
        }

        let conversation = self
            .get_conversation(message.conversation_id)
            .await?
            .ok_or(MessagingError::NotFound)?;
        if !conversation.is_participant(reader_id) {
            return Err(MessagingError::Forbidden);
        }

        let updated = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET read_by = read_by
                    || jsonb_build_array(jsonb_build_object('reader_id', $2::uuid, 'read_at', NOW())),
                status = 'read'
            WHERE id = $1
              AND NOT (read_by @> jsonb_build_array(jsonb_build_object('reader_id', $2::uuid)))
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(reader_id)
        .fetch_optional(&*self.pool)
        .await?;

        // None means the receipt already existed; return the message as-is.
        Ok(updated.unwrap_or(message))
    }

    /// Tombstone a message. Only its sender may do so; the row is kept.
    pub async fn delete_message(
        &self,
        message_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Message, MessagingError> {
        let deleted = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET deleted = TRUE
            WHERE id = $1 AND sender_id = $2
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(requester_id)
        .fetch_optional(&*self.pool)
        .await?;

        match deleted {
            Some(message) => Ok(message),
            None => {
                let exists: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = $1")
                        .bind(message_id)
                        .fetch_one(&*self.pool)
                        .await?;
                if exists > 0 {
                    Err(MessagingError::Forbidden)
                } else {
                    Err(MessagingError::MessageNotFound)
                }
            }
        }
    }

    /// Archive, block or reactivate a conversation (participants only).
    /// Conversations are never hard-deleted.
    pub async fn update_status(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        status: ConversationStatus,
    ) -> Result<Conversation, MessagingError> {
        let conversation = self
            .get_conversation(conversation_id)
            .await?
            .ok_or(MessagingError::NotFound)?;
        if !conversation.is_participant(user_id) {
            return Err(MessagingError::Forbidden);
        }

        let conversation = sqlx::query_as::<_, Conversation>(
            "UPDATE conversations SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(conversation_id)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(%conversation_id, status = ?conversation.status, "conversation status changed");
        Ok(conversation)
    }

    async fn conversation_for_pair(
        &self,
        business_owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Conversation>, MessagingError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE business_owner_id = $1 AND customer_id = $2",
        )
        .bind(business_owner_id)
        .bind(customer_id)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(conversation)
    }
}

/// Trim and bound message content
fn normalize_content(raw: &str) -> Result<String, MessagingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MessagingError::EmptyContent);
    }
    if trimmed.chars().count() > MAX_CONTENT_LEN {
        return Err(MessagingError::ContentTooLong);
    }
    Ok(trimmed.to_string())
}
