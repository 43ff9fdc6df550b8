//! Twilio voice webhooks; every response is TwiML

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Form,
};

use super::state::AppState;
use crate::domain::services::{CallParams, VoiceResponse};

fn twiml(response: VoiceResponse) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], response.to_xml())
}

/// POST /voice/webhook (also /api/voice/webhook)
pub async fn voice_webhook_handler(
    State(state): State<AppState>,
    Form(params): Form<CallParams>,
) -> impl IntoResponse {
    twiml(state.voice.webhook(&params).await)
}

/// POST /voice/process
pub async fn voice_process_handler(
    State(state): State<AppState>,
    Form(params): Form<CallParams>,
) -> impl IntoResponse {
    twiml(state.voice.process(&params).await)
}

/// POST /voice/continue
pub async fn voice_continue_handler(
    State(state): State<AppState>,
    Form(params): Form<CallParams>,
) -> impl IntoResponse {
    twiml(state.voice.continue_call(&params))
}
