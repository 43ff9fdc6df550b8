//! Structured logging for the hotel service desk
//!
//! Provides consistent, contextual logging across the application.
//! Uses tracing fields so chat turns, escalations and document jobs can be
//! filtered by operation.

/// Operations that get their own log vocabulary
#[derive(Debug, Clone, Copy)]
pub enum LogOperation {
    Startup,
    ChatTurn,
    Escalation,
    DocumentProcessing,
    VoiceCall,
    Cache,
}

impl LogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOperation::Startup => "startup",
            LogOperation::ChatTurn => "chat_turn",
            LogOperation::Escalation => "escalation",
            LogOperation::DocumentProcessing => "document_processing",
            LogOperation::VoiceCall => "voice_call",
            LogOperation::Cache => "cache",
        }
    }
}

/// Install the global tracing subscriber (RUST_LOG overrides the default level)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info")),
        )
        .try_init();
}

/// Log which backing services the server is starting with
pub fn log_startup(database_url: &str, cache_backend: &str, assistant: &str) {
    tracing::info!(
        operation = LogOperation::Startup.as_str(),
        database = database_url,
        cache = cache_backend,
        assistant = assistant,
        "Service dependencies ready"
    );
}

/// Log the end of a chat turn
pub fn log_chat_turn(
    channel: &str,
    conversation_id: &str,
    intent: &str,
    sentiment: &str,
    processing_time: f64,
) {
    tracing::info!(
        operation = LogOperation::ChatTurn.as_str(),
        channel = channel,
        conversation_id = conversation_id,
        intent = intent,
        sentiment = sentiment,
        processing_time = processing_time,
        "Chat turn completed"
    );
}

/// Log that the primary assistant failed and the fallback answered
pub fn log_assistant_fallback(conversation_id: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::ChatTurn.as_str(),
        conversation_id = conversation_id,
        error = error,
        "Primary assistant failed, using rule-based reply"
    );
}

/// Log a conversation handed to human staff
pub fn log_escalation(conversation_id: &str, guest_id: &str, reason: &str) {
    tracing::warn!(
        operation = LogOperation::Escalation.as_str(),
        conversation_id = conversation_id,
        guest_id = guest_id,
        reason = reason,
        "Conversation escalated to staff"
    );
}

/// Log document processing result
pub fn log_document_processed(document_id: &str, chunk_count: usize) {
    tracing::info!(
        operation = LogOperation::DocumentProcessing.as_str(),
        document_id = document_id,
        chunk_count = chunk_count,
        "Document indexed"
    );
}

/// Log document processing failure
pub fn log_document_failed(document_id: &str, error: &str) {
    tracing::error!(
        operation = LogOperation::DocumentProcessing.as_str(),
        document_id = document_id,
        error = error,
        "Document processing failed"
    );
}

/// Log a voice IVR step
pub fn log_voice_step(step: &str, call_sid: &str) {
    tracing::info!(
        operation = LogOperation::VoiceCall.as_str(),
        step = step,
        call_sid = call_sid,
        "Voice call step"
    );
}

/// Log a non-fatal cache failure
pub fn log_cache_error(key: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::Cache.as_str(),
        key = key,
        error = error,
        "Cache operation failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_operation_as_str() {
        assert_eq!(LogOperation::Startup.as_str(), "startup");
        assert_eq!(LogOperation::ChatTurn.as_str(), "chat_turn");
        assert_eq!(LogOperation::Escalation.as_str(), "escalation");
        assert_eq!(LogOperation::DocumentProcessing.as_str(), "document_processing");
        assert_eq!(LogOperation::VoiceCall.as_str(), "voice_call");
        assert_eq!(LogOperation::Cache.as_str(), "cache");
    }
}
