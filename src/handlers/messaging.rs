//! Messaging API handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{messaging_error, HandlerResult};
use crate::app_state::AppState;
use crate::messaging::{
    ConversationCreated, ConversationSummary, MessageEvent, SendMessageRequest,
    StartConversationRequest,
};
use crate::models::{ApiResponse, Conversation, ConversationStatus, Message};

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub user_id: Uuid,
}

/// Conversation list for one user, newest activity first
pub async fn list_conversations(
    State(app_state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> HandlerResult<Vec<ConversationSummary>> {
    match app_state
        .messaging_service
        .list_conversations(query.user_id)
        .await
    {
        Ok(summaries) => Ok(Json(ApiResponse::ok(summaries))),
        Err(e) => Err(messaging_error(e)),
    }
}

/// Find or create the conversation for a pair (idempotent)
pub async fn create_conversation(
    State(app_state): State<AppState>,
    Json(request): Json<StartConversationRequest>,
) -> HandlerResult<ConversationCreated> {
    if let Err(e) = request.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(format!("Validation error: {}", e))),
        ));
    }

    match app_state
        .messaging_service
        .find_or_create_conversation(request)
        .await
    {
        Ok((conversation, is_new)) => Ok(Json(ApiResponse::ok(ConversationCreated {
            id: conversation.id,
            is_new,
        }))),
        Err(e) => Err(messaging_error(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub requester_id: Uuid,
}

/// Ordered message history; implicitly marks the conversation read for the
/// requester
pub async fn get_messages(
    State(app_state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> HandlerResult<Vec<Message>> {
    match app_state
        .messaging_service
        .get_messages(conversation_id, query.requester_id)
        .await
    {
        Ok(messages) => Ok(Json(ApiResponse::ok(messages))),
        Err(e) => Err(messaging_error(e)),
    }
}

/// Send a message into a conversation
pub async fn send_message(
    State(app_state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> HandlerResult<Message> {
    if let Err(e) = request.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(format!("Validation error: {}", e))),
        ));
    }

    let sender_id = request.sender_id;
    match app_state
        .messaging_service
        .send_message(conversation_id, request)
        .await
    {
        Ok(message) => {
            // Push to the counterpart's channel, fire-and-forget.
            if let Ok(Some(conversation)) = app_state
                .messaging_service
                .get_conversation(conversation_id)
                .await
            {
                let counterpart = if sender_id == conversation.business_owner_id {
                    conversation.customer_id
                } else {
                    conversation.business_owner_id
                };
                app_state
                    .ws_state
                    .send_to_user(
                        counterpart,
                        &MessageEvent::MessageReceived {
                            conversation_id,
                            message: message.clone(),
                        },
                    )
                    .await;
            }

            Ok(Json(ApiResponse::ok(message)))
        }
        Err(e) => Err(messaging_error(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub reader_id: Uuid,
}

/// Mark the whole conversation read for one party
pub async fn mark_conversation_read(
    State(app_state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> HandlerResult<()> {
    match app_state
        .messaging_service
        .mark_conversation_read(conversation_id, request.reader_id)
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::ok(()))),
        Err(e) => Err(messaging_error(e)),
    }
}

/// Add a read receipt to a single message
pub async fn mark_message_read(
    State(app_state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> HandlerResult<Message> {
    match app_state
        .messaging_service
        .mark_message_read(message_id, request.reader_id)
        .await
    {
        Ok(message) => Ok(Json(ApiResponse::ok(message))),
        Err(e) => Err(messaging_error(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageQuery {
    pub requester_id: Uuid,
}

/// Soft-delete a message (sender only)
pub async fn delete_message(
    State(app_state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<DeleteMessageQuery>,
) -> HandlerResult<Message> {
    match app_state
        .messaging_service
        .delete_message(message_id, query.requester_id)
        .await
    {
        Ok(message) => Ok(Json(ApiResponse::ok(message))),
        Err(e) => Err(messaging_error(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub user_id: Uuid,
    pub status: ConversationStatus,
}

/// Archive, block or reactivate a conversation
pub async fn update_conversation_status(
    State(app_state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> HandlerResult<Conversation> {
    match app_state
        .messaging_service
        .update_status(conversation_id, request.user_id, request.status)
        .await
    {
        Ok(conversation) => {
            let counterpart = if request.user_id == conversation.business_owner_id {
                conversation.customer_id
            } else {
                conversation.business_owner_id
            };
            app_state
                .ws_state
                .send_to_user(
                    counterpart,
                    &MessageEvent::ConversationUpdated {
                        conversation_id,
                        status: conversation.status,
                    },
                )
                .await;

            Ok(Json(ApiResponse::ok(conversation)))
        }
        Err(e) => Err(messaging_error(e)),
    }
}
