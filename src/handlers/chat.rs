//! Web chat over plain HTTP

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;

use super::state::AppState;
use crate::domain::models::{Channel, GuestContext, MessageType};
use crate::domain::services::{TurnOutcome, TurnRequest};
use crate::shared::errors::Result;

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, alias = "user_info", alias = "user_context")]
    pub guest: GuestContext,
}

/// POST /api/chat
/// Run one chat turn on the web channel
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<TurnOutcome>> {
    let outcome = state
        .chat
        .handle_turn(TurnRequest {
            message: request.message,
            session_id: request.session_id,
            channel: Channel::Web,
            guest: request.guest,
            message_type: MessageType::Text,
            metadata: json!({}),
        })
        .await?;
    Ok(Json(outcome))
}
