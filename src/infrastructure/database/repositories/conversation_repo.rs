//! Conversation repository for database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{count_where, select_where, MessageRepository, QueryFilter};
use crate::domain::models::{Channel, Conversation, ConversationStatus, Intent, Priority, Sentiment};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "conversation";

/// Conversation record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub uid: String,
    pub guest_id: String,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub category: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    pub satisfaction_score: Option<u8>,
    pub agent_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Conversation {
            id: record.uid,
            user_id: record.guest_id,
            channel: record.channel,
            status: record.status,
            priority: record.priority,
            category: record.category,
            sentiment: record.sentiment,
            satisfaction_score: record.satisfaction_score,
            agent_id: record.agent_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            resolved_at: record.resolved_at,
        }
    }
}

/// Filters and paging for the conversation list
#[derive(Debug, Clone, Default)]
pub struct ConversationListQuery {
    pub status: Option<ConversationStatus>,
    pub channel: Option<Channel>,
    pub skip: usize,
    pub limit: usize,
}

impl ConversationListQuery {
    fn filter(&self) -> QueryFilter {
        QueryFilter::new()
            .eq("status", self.status)
            .eq("channel", self.channel)
    }
}

/// Conversation repository
pub struct ConversationRepository;

impl ConversationRepository {
    /// Open a new active conversation for a guest
    pub async fn create(db: &Database, guest_id: &str, channel: Channel) -> Result<Conversation> {
        let now = Utc::now();
        let record = ConversationRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            guest_id: guest_id.to_string(),
            channel,
            status: ConversationStatus::Active,
            priority: Priority::Normal,
            category: None,
            sentiment: None,
            satisfaction_score: None,
            agent_id: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };

        let created: Option<ConversationRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create conversation: {}", e)))?;

        created
            .map(Conversation::from)
            .ok_or_else(|| AppError::Database("Failed to create conversation".to_string()))
    }

    pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<Conversation>> {
        let record: Option<ConversationRecord> = db
            .select((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch conversation: {}", e)))?;
        Ok(record.map(Conversation::from))
    }

    /// Newest active conversation of a guest, optionally on one channel
    pub async fn find_active_for_guest(
        db: &Database,
        guest_id: &str,
        channel: Option<Channel>,
    ) -> Result<Option<Conversation>> {
        let filter = QueryFilter::new()
            .eq("guest_id", Some(guest_id))
            .eq("status", Some(ConversationStatus::Active))
            .eq("channel", channel);
        let records: Vec<ConversationRecord> =
            select_where(db, TABLE, &filter, " ORDER BY created_at DESC LIMIT 1").await?;
        Ok(records.into_iter().next().map(Conversation::from))
    }

    /// Filtered page of conversations, newest first
    pub async fn list(db: &Database, query: &ConversationListQuery) -> Result<Vec<Conversation>> {
        let tail = format!(
            " ORDER BY created_at DESC LIMIT {} START {}",
            query.limit, query.skip
        );
        let records: Vec<ConversationRecord> = select_where(db, TABLE, &query.filter(), &tail).await?;
        Ok(records.into_iter().map(Conversation::from).collect())
    }

    /// Number of conversations matching the list filters (paging ignored)
    pub async fn count(db: &Database, query: &ConversationListQuery) -> Result<usize> {
        count_where(db, TABLE, &query.filter()).await
    }

    pub async fn count_by_status(db: &Database, status: Option<ConversationStatus>) -> Result<usize> {
        count_where(db, TABLE, &QueryFilter::new().eq("status", status)).await
    }

    /// Record the outcome of an AI turn on the conversation
    pub async fn apply_turn_metadata(
        db: &Database,
        id: &str,
        category: Intent,
        sentiment: Sentiment,
        escalate: bool,
    ) -> Result<Option<Conversation>> {
        let mut patch = json!({
            "category": category,
            "sentiment": sentiment,
            "updated_at": Utc::now().timestamp_millis(),
        });
        if escalate {
            patch["priority"] = json!(Priority::High);
        }
        Self::merge(db, id, patch).await
    }

    /// Hand the conversation to a human
    pub async fn escalate(
        db: &Database,
        id: &str,
        agent_id: Option<String>,
    ) -> Result<Option<Conversation>> {
        let mut patch = json!({
            "status": ConversationStatus::Escalated,
            "priority": Priority::High,
            "updated_at": Utc::now().timestamp_millis(),
        });
        if let Some(agent_id) = agent_id {
            patch["agent_id"] = json!(agent_id);
        }
        Self::merge(db, id, patch).await
    }

    pub async fn resolve(
        db: &Database,
        id: &str,
        satisfaction_score: Option<u8>,
    ) -> Result<Option<Conversation>> {
        let now = Utc::now().timestamp_millis();
        let mut patch = json!({
            "status": ConversationStatus::Resolved,
            "resolved_at": now,
            "updated_at": now,
        });
        if let Some(score) = satisfaction_score {
            patch["satisfaction_score"] = json!(score);
        }
        Self::merge(db, id, patch).await
    }

    async fn merge(db: &Database, id: &str, patch: serde_json::Value) -> Result<Option<Conversation>> {
        if Self::find_by_id(db, id).await?.is_none() {
            return Ok(None);
        }
        let updated: Option<ConversationRecord> = db
            .update((TABLE, id))
            .merge(patch)
            .await
            .map_err(|e| AppError::Database(format!("Failed to update conversation: {}", e)))?;
        Ok(updated.map(Conversation::from))
    }

    /// Delete a conversation and its messages; returns whether it existed
    pub async fn delete(db: &Database, id: &str) -> Result<bool> {
        MessageRepository::delete_for_conversation(db, id).await?;
        let deleted: Option<ConversationRecord> = db
            .delete((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete conversation: {}", e)))?;
        Ok(deleted.is_some())
    }

    pub async fn created_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Conversation>> {
        let filter = QueryFilter::new().between("created_at", start, end);
        let records: Vec<ConversationRecord> =
            select_where(db, TABLE, &filter, " ORDER BY created_at ASC").await?;
        Ok(records.into_iter().map(Conversation::from).collect())
    }

    pub async fn resolved_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Conversation>> {
        let filter = QueryFilter::new().between("resolved_at", start, end);
        let records: Vec<ConversationRecord> = select_where(db, TABLE, &filter, "").await?;
        Ok(records.into_iter().map(Conversation::from).collect())
    }

    pub async fn all(db: &Database) -> Result<Vec<Conversation>> {
        let records: Vec<ConversationRecord> = select_where(db, TABLE, &QueryFilter::new(), "").await?;
        Ok(records.into_iter().map(Conversation::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::test_database;
    use crate::infrastructure::database::repositories::NewMessage;
    use crate::domain::models::SenderType;

    #[tokio::test]
    async fn test_find_active_for_guest_respects_channel() {
        let db = test_database().await;
        let web = ConversationRepository::create(&db, "g1", Channel::Web).await.unwrap();

        let found = ConversationRepository::find_active_for_guest(&db, "g1", Some(Channel::Web))
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(web.id.clone()));

        let voice = ConversationRepository::find_active_for_guest(&db, "g1", Some(Channel::Voice))
            .await
            .unwrap();
        assert!(voice.is_none());

        ConversationRepository::resolve(&db, &web.id, None).await.unwrap();
        let after = ConversationRepository::find_active_for_guest(&db, "g1", None).await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let db = test_database().await;
        for guest in ["a", "b", "c"] {
            ConversationRepository::create(&db, guest, Channel::Web).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        ConversationRepository::create(&db, "d", Channel::Voice).await.unwrap();

        let web = ConversationListQuery {
            channel: Some(Channel::Web),
            limit: 2,
            ..Default::default()
        };
        assert_eq!(ConversationRepository::count(&db, &web).await.unwrap(), 3);

        let page = ConversationRepository::list(&db, &web).await.unwrap();
        let owners: Vec<&str> = page.iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(owners, vec!["c", "b"]);

        let second = ConversationListQuery { skip: 2, ..web };
        assert_eq!(ConversationRepository::list(&db, &second).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_escalate_and_resolve() {
        let db = test_database().await;
        let conv = ConversationRepository::create(&db, "g", Channel::Web).await.unwrap();

        let escalated = ConversationRepository::escalate(&db, &conv.id, Some("agent-7".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(escalated.status, ConversationStatus::Escalated);
        assert_eq!(escalated.priority, Priority::High);
        assert_eq!(escalated.agent_id.as_deref(), Some("agent-7"));

        let resolved = ConversationRepository::resolve(&db, &conv.id, Some(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.status, ConversationStatus::Resolved);
        assert_eq!(resolved.satisfaction_score, Some(5));
        assert!(resolved.resolved_at.is_some());

        assert!(ConversationRepository::escalate(&db, "missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_turn_metadata_raises_priority_on_escalation() {
        let db = test_database().await;
        let conv = ConversationRepository::create(&db, "g", Channel::Web).await.unwrap();

        let calm = ConversationRepository::apply_turn_metadata(
            &db, &conv.id, Intent::Dining, Sentiment::Positive, false,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(calm.category, Some(Intent::Dining));
        assert_eq!(calm.priority, Priority::Normal);

        let upset = ConversationRepository::apply_turn_metadata(
            &db, &conv.id, Intent::Complaint, Sentiment::Negative, true,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(upset.priority, Priority::High);
        assert_eq!(upset.status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn test_delete_cascades_messages() {
        let db = test_database().await;
        let conv = ConversationRepository::create(&db, "g", Channel::Web).await.unwrap();
        MessageRepository::create(&db, NewMessage::text(&conv.id, SenderType::User, "hi"))
            .await
            .unwrap();

        assert!(ConversationRepository::delete(&db, &conv.id).await.unwrap());
        assert_eq!(MessageRepository::count(&db).await.unwrap(), 0);
        assert!(ConversationRepository::find_by_id(&db, &conv.id).await.unwrap().is_none());
    }
}
