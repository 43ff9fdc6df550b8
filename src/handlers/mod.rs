//! HTTP and WebSocket surface

pub mod state;
pub mod health;
pub mod chat;

/// Conversation listing, transcripts, escalation and resolution
pub mod conversation;
pub mod users;

/// Admin dashboard page and analytics JSON
pub mod admin;

/// Knowledge base documents
pub mod documents;
pub mod requests;

/// Twilio voice IVR webhooks
pub mod voice;

/// WebSocket events
pub mod realtime;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::domain::models::document::MAX_DOCUMENT_SIZE;

pub use state::AppState;

/// Multipart framing on top of the largest accepted document
const UPLOAD_BODY_LIMIT: usize = MAX_DOCUMENT_SIZE + 1024 * 1024;

/// All application routes, without static files or middleware
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_handler))
        .route("/chat", post(chat::chat_handler))
        .route("/conversations", get(conversation::list_conversations_handler))
        .route(
            "/conversations/{id}",
            get(conversation::get_conversation_handler).delete(conversation::delete_conversation_handler),
        )
        .route("/conversations/{id}/messages", get(conversation::conversation_messages_handler))
        .route("/conversations/{id}/escalate", post(conversation::escalate_conversation_handler))
        .route("/conversations/{id}/resolve", post(conversation::resolve_conversation_handler))
        .route("/messages/{id}", delete(conversation::delete_message_handler))
        .route(
            "/users/{id}",
            get(users::get_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route("/analytics/dashboard", get(admin::dashboard_analytics_handler))
        .route(
            "/documents/upload",
            post(documents::upload_document_handler).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/documents", get(documents::list_documents_handler))
        .route("/documents/search", get(documents::search_documents_handler))
        .route(
            "/documents/{id}",
            get(documents::get_document_handler).delete(documents::delete_document_handler),
        )
        .route("/documents/{id}/reprocess", post(documents::reprocess_document_handler))
        .route(
            "/requests",
            get(requests::list_requests_handler).post(requests::create_request_handler),
        )
        .route("/requests/{id}/status", put(requests::update_request_status_handler))
        .route("/voice/webhook", post(voice::voice_webhook_handler));

    let voice_routes = Router::new()
        .route("/webhook", post(voice::voice_webhook_handler))
        .route("/process", post(voice::voice_process_handler))
        .route("/continue", post(voice::voice_continue_handler));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard_page_handler))
        .route("/conversations", get(admin::dashboard_page_handler))
        .route("/analytics", get(admin::dashboard_page_handler))
        .route("/api/stats", get(admin::admin_stats_handler))
        .route("/api/charts/conversations", get(admin::conversation_charts_handler));

    Router::new()
        .nest("/api", api)
        .nest("/voice", voice_routes)
        .nest("/admin", admin_routes)
        .route("/ws", get(realtime::ws_handler))
        .with_state(state)
}
