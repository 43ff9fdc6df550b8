//! Repository layer for database operations
//!
//! Provides type-safe CRUD operations for:
//! - Guests
//! - Conversations and messages
//! - Documents and their chunks
//! - Guest requests
//! - Analytics events

pub mod guest_repo;
pub mod conversation_repo;
pub mod message_repo;
pub mod document_repo;
pub mod request_repo;
pub mod analytics_repo;

pub use guest_repo::{GuestRepository, GuestUpdate};
pub use conversation_repo::{ConversationListQuery, ConversationRepository};
pub use message_repo::{MessageRepository, NewMessage};
pub use document_repo::{ChunkRecord, DocumentRepository, NewChunk, NewDocument};
pub use request_repo::{GuestRequestRepository, NewGuestRequest, RequestUpdate};
pub use analytics_repo::AnalyticsRepository;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::connection::Database;
use crate::shared::errors::{AppError, Result};

/// WHERE clause builder with bound parameters
#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    clauses: Vec<String>,
    binds: Vec<(String, serde_json::Value)>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field = value`, skipped when value is None
    pub fn eq<V: serde::Serialize>(mut self, field: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            let param = format!("p{}", self.binds.len());
            self.clauses.push(format!("{} = ${}", field, param));
            self.binds.push((param, serde_json::json!(value)));
        }
        self
    }

    /// `field IN values`
    pub fn one_of(mut self, field: &str, values: Vec<String>) -> Self {
        let param = format!("p{}", self.binds.len());
        self.clauses.push(format!("{} IN ${}", field, param));
        self.binds.push((param, serde_json::json!(values)));
        self
    }

    /// `start <= field < end` on an epoch-millisecond field
    pub fn between(mut self, field: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let from = format!("p{}", self.binds.len());
        let to = format!("p{}", self.binds.len() + 1);
        self.clauses.push(format!("{} >= ${} AND {} < ${}", field, from, field, to));
        self.binds.push((from, serde_json::json!(start.timestamp_millis())));
        self.binds.push((to, serde_json::json!(end.timestamp_millis())));
        self
    }

    /// `field >= since` on an epoch-millisecond field
    pub fn since(mut self, field: &str, since: DateTime<Utc>) -> Self {
        let param = format!("p{}", self.binds.len());
        self.clauses.push(format!("{} >= ${}", field, param));
        self.binds.push((param, serde_json::json!(since.timestamp_millis())));
        self
    }

    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

#[derive(Deserialize)]
struct CountRow {
    count: usize,
}

/// Run a SELECT built from `head`, the filter and `tail` (ORDER/LIMIT)
pub(crate) async fn select_where<T: DeserializeOwned>(
    db: &Database,
    table: &str,
    filter: &QueryFilter,
    tail: &str,
) -> Result<Vec<T>> {
    let sql = format!("SELECT * FROM {}{}{}", table, filter.where_clause(), tail);
    let mut query = db.query(sql);
    for (name, value) in filter.binds.iter().cloned() {
        query = query.bind((name, value));
    }

    query
        .await
        .map_err(|e| AppError::Database(format!("Failed to query {}: {}", table, e)))?
        .take(0)
        .map_err(|e| AppError::Database(format!("Failed to parse {} rows: {}", table, e)))
}

/// Count rows matching the filter
pub(crate) async fn count_where(db: &Database, table: &str, filter: &QueryFilter) -> Result<usize> {
    let sql = format!(
        "SELECT count() AS count FROM {}{} GROUP ALL",
        table,
        filter.where_clause()
    );
    let mut query = db.query(sql);
    for (name, value) in filter.binds.iter().cloned() {
        query = query.bind((name, value));
    }

    let row: Option<CountRow> = query
        .await
        .map_err(|e| AppError::Database(format!("Failed to count {}: {}", table, e)))?
        .take(0)
        .map_err(|e| AppError::Database(format!("Failed to parse {} count: {}", table, e)))?;

    Ok(row.map(|r| r.count).unwrap_or(0))
}

/// Delete rows matching the filter
pub(crate) async fn delete_where(db: &Database, table: &str, filter: &QueryFilter) -> Result<()> {
    let sql = format!("DELETE FROM {}{}", table, filter.where_clause());
    let mut query = db.query(sql);
    for (name, value) in filter.binds.iter().cloned() {
        query = query.bind((name, value));
    }

    query
        .await
        .and_then(|response| response.check())
        .map_err(|e| AppError::Database(format!("Failed to delete from {}: {}", table, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_skips_missing_values() {
        let filter = QueryFilter::new()
            .eq("status", Some("active"))
            .eq::<&str>("channel", None);
        assert_eq!(filter.where_clause(), " WHERE status = $p0");
    }

    #[test]
    fn test_filter_between_binds_two_params() {
        let start = Utc::now();
        let filter = QueryFilter::new()
            .eq("sender_type", Some("ai"))
            .between("created_at", start, start + chrono::Duration::days(1));
        assert_eq!(
            filter.where_clause(),
            " WHERE sender_type = $p0 AND created_at >= $p1 AND created_at < $p2"
        );
    }

    #[test]
    fn test_empty_filter() {
        assert_eq!(QueryFilter::new().where_clause(), "");
    }
}
