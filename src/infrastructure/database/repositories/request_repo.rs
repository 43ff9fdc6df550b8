//! Guest request repository for database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{count_where, select_where, QueryFilter};
use crate::domain::models::{GuestRequest, RequestPriority, RequestStatus};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "guest_request";

/// Guest request record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestRequestRecord {
    pub uid: String,
    pub conversation_id: Option<String>,
    pub guest_id: String,
    pub request_type: String,
    pub title: String,
    pub description: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub room_number: Option<String>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<GuestRequestRecord> for GuestRequest {
    fn from(record: GuestRequestRecord) -> Self {
        GuestRequest {
            id: record.uid,
            conversation_id: record.conversation_id,
            user_id: record.guest_id,
            request_type: record.request_type,
            title: record.title,
            description: record.description,
            priority: record.priority,
            status: record.status,
            room_number: record.room_number,
            assigned_to: record.assigned_to,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
            completed_at: record.completed_at,
        }
    }
}

/// Input for creating a guest request
#[derive(Debug, Clone, Deserialize)]
pub struct NewGuestRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(alias = "guest_id")]
    pub user_id: String,
    pub request_type: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    #[serde(default)]
    pub priority: Option<RequestPriority>,
    #[serde(default)]
    pub room_number: Option<String>,
}

/// Staff-side changes to a request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestUpdate {
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub priority: Option<RequestPriority>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Guest request repository
pub struct GuestRequestRepository;

impl GuestRequestRepository {
    pub async fn create(db: &Database, request: NewGuestRequest) -> Result<GuestRequest> {
        let now = Utc::now();
        let title = request
            .title
            .unwrap_or_else(|| default_title(&request.request_type));
        let record = GuestRequestRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            conversation_id: request.conversation_id,
            guest_id: request.user_id,
            request_type: request.request_type,
            title,
            description: request.description,
            priority: request.priority.unwrap_or(RequestPriority::Medium),
            status: RequestStatus::Pending,
            room_number: request.room_number,
            assigned_to: None,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let created: Option<GuestRequestRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create guest request: {}", e)))?;

        created
            .map(GuestRequest::from)
            .ok_or_else(|| AppError::Database("Failed to create guest request".to_string()))
    }

    pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<GuestRequest>> {
        let record: Option<GuestRequestRecord> = db
            .select((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch guest request: {}", e)))?;
        Ok(record.map(GuestRequest::from))
    }

    /// Requests matching the filters, newest first
    pub async fn list(
        db: &Database,
        status: Option<RequestStatus>,
        priority: Option<RequestPriority>,
    ) -> Result<Vec<GuestRequest>> {
        let filter = QueryFilter::new()
            .eq("status", status)
            .eq("priority", priority);
        let records: Vec<GuestRequestRecord> =
            select_where(db, TABLE, &filter, " ORDER BY created_at DESC").await?;
        Ok(records.into_iter().map(GuestRequest::from).collect())
    }

    /// Apply a staff update; the first move to `completed` stamps completed_at
    pub async fn update(db: &Database, id: &str, update: RequestUpdate) -> Result<Option<GuestRequest>> {
        let Some(current) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };

        let now = Utc::now().timestamp_millis();
        let mut patch = json!({ "updated_at": now });
        if let Some(status) = update.status {
            patch["status"] = json!(status);
            if status == RequestStatus::Completed && current.completed_at.is_none() {
                patch["completed_at"] = json!(now);
            }
        }
        if let Some(priority) = update.priority {
            patch["priority"] = json!(priority);
        }
        if let Some(assigned_to) = update.assigned_to {
            patch["assigned_to"] = json!(assigned_to);
        }
        if let Some(notes) = update.notes {
            patch["notes"] = json!(notes);
        }

        let updated: Option<GuestRequestRecord> = db
            .update((TABLE, id))
            .merge(patch)
            .await
            .map_err(|e| AppError::Database(format!("Failed to update guest request: {}", e)))?;
        Ok(updated.map(GuestRequest::from))
    }

    pub async fn created_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GuestRequest>> {
        let filter = QueryFilter::new().between("created_at", start, end);
        let records: Vec<GuestRequestRecord> = select_where(db, TABLE, &filter, "").await?;
        Ok(records.into_iter().map(GuestRequest::from).collect())
    }

    pub async fn count(db: &Database) -> Result<usize> {
        count_where(db, TABLE, &QueryFilter::new()).await
    }
}

/// "room_service" -> "Room Service request"
pub fn default_title(request_type: &str) -> String {
    let words: Vec<String> = request_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("{} request", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::test_database;

    fn housekeeping() -> NewGuestRequest {
        NewGuestRequest {
            conversation_id: Some("c1".to_string()),
            user_id: "g1".to_string(),
            request_type: "housekeeping".to_string(),
            title: None,
            description: "Extra towels please".to_string(),
            priority: None,
            room_number: Some("301".to_string()),
        }
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("room_service"), "Room Service request");
        assert_eq!(default_title("maintenance"), "Maintenance request");
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let db = test_database().await;
        let request = GuestRequestRepository::create(&db, housekeeping()).await.unwrap();
        assert_eq!(request.title, "Housekeeping request");
        assert_eq!(request.priority, RequestPriority::Medium);
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_completed_at_set_once() {
        let db = test_database().await;
        let request = GuestRequestRepository::create(&db, housekeeping()).await.unwrap();

        let done = GuestRequestRepository::update(
            &db,
            &request.id,
            RequestUpdate {
                status: Some(RequestStatus::Completed),
                notes: Some("delivered".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        let first = done.completed_at.unwrap();
        assert_eq!(done.notes.as_deref(), Some("delivered"));

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let again = GuestRequestRepository::update(
            &db,
            &request.id,
            RequestUpdate {
                status: Some(RequestStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(again.completed_at, Some(first));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_database().await;
        let first = GuestRequestRepository::create(&db, housekeeping()).await.unwrap();
        let mut urgent = housekeeping();
        urgent.priority = Some(RequestPriority::Urgent);
        GuestRequestRepository::create(&db, urgent).await.unwrap();

        GuestRequestRepository::update(
            &db,
            &first.id,
            RequestUpdate {
                status: Some(RequestStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let pending = GuestRequestRepository::list(&db, Some(RequestStatus::Pending), None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].priority, RequestPriority::Urgent);

        let urgent = GuestRequestRepository::list(&db, None, Some(RequestPriority::Urgent))
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(GuestRequestRepository::list(&db, None, None).await.unwrap().len(), 2);
    }
}
