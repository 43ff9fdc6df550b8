//! Message repository for database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{count_where, delete_where, select_where, QueryFilter};
use crate::domain::models::{Intent, Message, MessageType, SenderType, Sentiment};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "message";

/// Message record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub uid: String,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    pub confidence: Option<f64>,
    pub processing_time: Option<f64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            id: record.uid,
            conversation_id: record.conversation_id,
            sender_type: record.sender_type,
            sender_id: record.sender_id,
            content: record.content,
            message_type: record.message_type,
            metadata: record.metadata,
            intent: record.intent,
            sentiment: record.sentiment,
            confidence: record.confidence,
            processing_time: record.processing_time,
            created_at: record.created_at,
        }
    }
}

/// Input for creating a message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    pub confidence: Option<f64>,
    pub processing_time: Option<f64>,
}

impl NewMessage {
    /// Plain text message with no analysis attached
    pub fn text(conversation_id: &str, sender_type: SenderType, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            sender_type,
            sender_id: None,
            content: content.into(),
            message_type: MessageType::Text,
            metadata: serde_json::json!({}),
            intent: None,
            sentiment: None,
            confidence: None,
            processing_time: None,
        }
    }
}

/// Message repository
pub struct MessageRepository;

impl MessageRepository {
    /// Create a message
    pub async fn create(db: &Database, message: NewMessage) -> Result<Message> {
        let record = MessageRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id,
            sender_type: message.sender_type,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            metadata: message.metadata,
            intent: message.intent,
            sentiment: message.sentiment,
            confidence: message.confidence,
            processing_time: message.processing_time,
            created_at: Utc::now(),
        };

        let created: Option<MessageRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create message: {}", e)))?;

        created
            .map(Message::from)
            .ok_or_else(|| AppError::Database("Failed to create message".to_string()))
    }

    pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<Message>> {
        let record: Option<MessageRecord> = db
            .select((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch message: {}", e)))?;
        Ok(record.map(Message::from))
    }

    /// Messages of a conversation, oldest first
    pub async fn list_for_conversation(
        db: &Database,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let filter = QueryFilter::new().eq("conversation_id", Some(conversation_id));
        let tail = match limit {
            Some(limit) => format!(" ORDER BY created_at ASC LIMIT {}", limit),
            None => " ORDER BY created_at ASC".to_string(),
        };
        let records: Vec<MessageRecord> = select_where(db, TABLE, &filter, &tail).await?;
        Ok(records.into_iter().map(Message::from).collect())
    }

    /// The last `limit` messages of a conversation, in chronological order
    pub async fn recent_for_conversation(
        db: &Database,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let filter = QueryFilter::new().eq("conversation_id", Some(conversation_id));
        let tail = format!(" ORDER BY created_at DESC LIMIT {}", limit);
        let records: Vec<MessageRecord> = select_where(db, TABLE, &filter, &tail).await?;
        let mut messages: Vec<Message> = records.into_iter().map(Message::from).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Delete a message; returns whether it existed
    pub async fn delete(db: &Database, id: &str) -> Result<bool> {
        let deleted: Option<MessageRecord> = db
            .delete((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete message: {}", e)))?;
        Ok(deleted.is_some())
    }

    pub async fn delete_for_conversation(db: &Database, conversation_id: &str) -> Result<()> {
        let filter = QueryFilter::new().eq("conversation_id", Some(conversation_id));
        delete_where(db, TABLE, &filter).await
    }

    pub async fn count(db: &Database) -> Result<usize> {
        count_where(db, TABLE, &QueryFilter::new()).await
    }

    pub async fn count_for_conversation(db: &Database, conversation_id: &str) -> Result<usize> {
        let filter = QueryFilter::new().eq("conversation_id", Some(conversation_id));
        count_where(db, TABLE, &filter).await
    }

    /// Messages created in `[start, end)`, optionally restricted to one sender type
    pub async fn created_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sender_type: Option<SenderType>,
    ) -> Result<Vec<Message>> {
        let filter = QueryFilter::new()
            .eq("sender_type", sender_type)
            .between("created_at", start, end);
        let records: Vec<MessageRecord> =
            select_where(db, TABLE, &filter, " ORDER BY created_at ASC").await?;
        Ok(records.into_iter().map(Message::from).collect())
    }

    /// Message counts per conversation for the given conversations
    pub async fn count_by_conversation(
        db: &Database,
        conversation_ids: Vec<String>,
    ) -> Result<HashMap<String, usize>> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(Deserialize)]
        struct Row {
            conversation_id: String,
            count: usize,
        }

        let rows: Vec<Row> = db
            .query(
                "SELECT conversation_id, count() AS count FROM message \
                 WHERE conversation_id IN $ids GROUP BY conversation_id",
            )
            .bind(("ids", conversation_ids))
            .await
            .map_err(|e| AppError::Database(format!("Failed to count messages: {}", e)))?
            .take(0)
            .map_err(|e| AppError::Database(format!("Failed to parse message counts: {}", e)))?;

        Ok(rows.into_iter().map(|r| (r.conversation_id, r.count)).collect())
    }
}
