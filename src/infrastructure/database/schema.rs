//! Database schema definitions and migrations
//!
//! Tables are schemaless; records carry their key in a `uid` field that is
//! also used as the record id. Timestamps are epoch milliseconds so range
//! filters and ordering are numeric.

use super::connection::Database;
use crate::shared::errors::{AppError, Result};

/// Run all database migrations
pub async fn run_migrations(db: &Database) -> Result<()> {
    tracing::info!("Running database migrations...");

    define(db, "guest", r#"
        DEFINE TABLE IF NOT EXISTS guest SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_guest_uid ON guest FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_guest_session ON guest FIELDS session_id;
        DEFINE INDEX IF NOT EXISTS idx_guest_phone ON guest FIELDS phone;
    "#).await?;

    define(db, "conversation", r#"
        DEFINE TABLE IF NOT EXISTS conversation SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_conv_uid ON conversation FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_conv_guest ON conversation FIELDS guest_id, status;
        DEFINE INDEX IF NOT EXISTS idx_conv_created ON conversation FIELDS created_at;
    "#).await?;

    define(db, "message", r#"
        DEFINE TABLE IF NOT EXISTS message SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_msg_uid ON message FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_msg_conversation ON message FIELDS conversation_id;
        DEFINE INDEX IF NOT EXISTS idx_msg_created ON message FIELDS created_at;
    "#).await?;

    define(db, "document", r#"
        DEFINE TABLE IF NOT EXISTS document SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_doc_uid ON document FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_doc_checksum ON document FIELDS checksum;
    "#).await?;

    define(db, "document_chunk", r#"
        DEFINE TABLE IF NOT EXISTS document_chunk SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_chunk_uid ON document_chunk FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_chunk_document ON document_chunk FIELDS document_id;
    "#).await?;

    define(db, "guest_request", r#"
        DEFINE TABLE IF NOT EXISTS guest_request SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_req_uid ON guest_request FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_req_status ON guest_request FIELDS status;
    "#).await?;

    define(db, "analytics_event", r#"
        DEFINE TABLE IF NOT EXISTS analytics_event SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_event_uid ON analytics_event FIELDS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_event_time ON analytics_event FIELDS timestamp;
    "#).await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

async fn define(db: &Database, table: &str, statements: &'static str) -> Result<()> {
    db.query(statements)
        .await
        .and_then(|response| response.check())
        .map_err(|e| AppError::Database(format!("Failed to create {} table: {}", table, e)))?;
    Ok(())
}
