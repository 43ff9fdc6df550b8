//! Analytics event repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{select_where, QueryFilter};
use crate::domain::models::{AnalyticsEvent, EventType};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "analytics_event";

/// Analytics event record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub uid: String,
    pub event_type: EventType,
    pub channel: Option<String>,
    pub value: f64,
    pub metadata: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<AnalyticsRecord> for AnalyticsEvent {
    fn from(record: AnalyticsRecord) -> Self {
        AnalyticsEvent {
            id: record.uid,
            event_type: record.event_type,
            channel: record.channel,
            value: record.value,
            metadata: record.metadata,
            timestamp: record.timestamp,
        }
    }
}

/// Analytics repository
pub struct AnalyticsRepository;

impl AnalyticsRepository {
    pub async fn record(
        db: &Database,
        event_type: EventType,
        channel: Option<&str>,
        value: f64,
        metadata: serde_json::Value,
    ) -> Result<AnalyticsEvent> {
        let record = AnalyticsRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            event_type,
            channel: channel.map(str::to_string),
            value,
            metadata,
            timestamp: Utc::now(),
        };

        let created: Option<AnalyticsRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to record analytics event: {}", e)))?;

        created
            .map(AnalyticsEvent::from)
            .ok_or_else(|| AppError::Database("Failed to record analytics event".to_string()))
    }

    /// Events in `[start, end)`, optionally of one type, oldest first
    pub async fn between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: Option<EventType>,
    ) -> Result<Vec<AnalyticsEvent>> {
        let filter = QueryFilter::new()
            .eq("event_type", event_type)
            .between("timestamp", start, end);
        let records: Vec<AnalyticsRecord> =
            select_where(db, TABLE, &filter, " ORDER BY timestamp ASC").await?;
        Ok(records.into_iter().map(AnalyticsEvent::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::test_database;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_query_by_type() {
        let db = test_database().await;
        AnalyticsRepository::record(&db, EventType::ChatTurn, Some("web"), 0.2, json!({}))
            .await
            .unwrap();
        AnalyticsRepository::record(
            &db,
            EventType::GuestRequestRecorded,
            Some("web"),
            1.0,
            json!({ "request_type": "housekeeping" }),
        )
        .await
        .unwrap();

        let now = Utc::now();
        let start = now - chrono::Duration::minutes(1);
        let end = now + chrono::Duration::minutes(1);

        let all = AnalyticsRepository::between(&db, start, end, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let requests =
            AnalyticsRepository::between(&db, start, end, Some(EventType::GuestRequestRecorded))
                .await
                .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].metadata["request_type"], "housekeeping");

        let earlier = AnalyticsRepository::between(&db, start - chrono::Duration::days(1), start, None)
            .await
            .unwrap();
        assert!(earlier.is_empty());
    }
}
