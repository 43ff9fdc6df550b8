//! Conversation management handlers
//!
//! Listing, transcripts, escalation and resolution for staff tools.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::state::AppState;
use crate::domain::models::{Channel, Conversation, ConversationDetail, ConversationStatus, Message};
use crate::infrastructure::database::{ConversationListQuery, ConversationRepository, MessageRepository};
use crate::realtime::ADMIN_ROOM;
use crate::shared::errors::{AppError, Result};
use crate::shared::logging;

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;
/// Keeps the row offset well inside what the database accepts
const MAX_PAGE: usize = 100_000;

/// Parse an optional JSON body; an empty body gives the default
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}

/// Query parameters for the conversation list
#[derive(Debug, Default, Deserialize)]
pub struct ListConversationsParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub status: Option<ConversationStatus>,
    pub channel: Option<Channel>,
}

#[derive(Debug, Serialize)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
}

/// GET /api/conversations
/// Newest first, paginated
pub async fn list_conversations_handler(
    State(state): State<AppState>,
    Query(params): Query<ListConversationsParams>,
) -> Result<Json<ConversationPage>> {
    let page = params.page.unwrap_or(1).clamp(1, MAX_PAGE);
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let query = ConversationListQuery {
        status: params.status,
        channel: params.channel,
        skip: (page - 1).saturating_mul(per_page),
        limit: per_page,
    };
    let conversations = ConversationRepository::list(&state.db, &query).await?;
    let total = ConversationRepository::count(&state.db, &query).await?;

    Ok(Json(ConversationPage {
        conversations,
        total,
        pages: total.div_ceil(per_page),
        current_page: page,
    }))
}

/// GET /api/conversations/{id}
pub async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>> {
    let conversation = ConversationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;
    let messages = MessageRepository::list_for_conversation(&state.db, &id, None).await?;

    Ok(Json(ConversationDetail {
        message_count: messages.len(),
        conversation,
        messages,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

/// GET /api/conversations/{id}/messages
/// Oldest first
pub async fn conversation_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageList>> {
    let messages = MessageRepository::list_for_conversation(&state.db, &id, None).await?;
    Ok(Json(MessageList { messages }))
}

#[derive(Debug, Default, Deserialize)]
pub struct EscalateRequest {
    pub agent_id: Option<String>,
}

/// POST /api/conversations/{id}/escalate
pub async fn escalate_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: EscalateRequest = optional_json(&body)?;
    let conversation = ConversationRepository::escalate(&state.db, &id, request.agent_id)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;

    logging::log_escalation(&conversation.id, &conversation.user_id, "escalated by staff");
    state.hub.publish(
        ADMIN_ROOM,
        "conversation_updated",
        json!({ "conversation": conversation }),
    );

    Ok(Json(json!({ "message": "Conversation escalated successfully" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub satisfaction_score: Option<u8>,
}

/// POST /api/conversations/{id}/resolve
pub async fn resolve_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: ResolveRequest = optional_json(&body)?;
    if let Some(score) = request.satisfaction_score {
        if !(1..=5).contains(&score) {
            return Err(AppError::Validation(
                "satisfaction_score must be between 1 and 5".to_string(),
            ));
        }
    }

    let conversation = ConversationRepository::resolve(&state.db, &id, request.satisfaction_score)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;
    tracing::info!(conversation_id = %conversation.id, "Conversation resolved");
    state.hub.publish(
        ADMIN_ROOM,
        "conversation_updated",
        json!({ "conversation": conversation }),
    );

    Ok(Json(json!({ "message": "Conversation resolved successfully" })))
}

/// DELETE /api/conversations/{id}
/// Removes the conversation and its messages
pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if !ConversationRepository::delete(&state.db, &id).await? {
        return Err(AppError::NotFound("Conversation"));
    }
    tracing::info!(conversation_id = %id, "Conversation deleted");
    Ok(Json(json!({ "message": "Conversation deleted successfully" })))
}

/// DELETE /api/messages/{id}
pub async fn delete_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if !MessageRepository::delete(&state.db, &id).await? {
        return Err(AppError::NotFound("Message"));
    }
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}
