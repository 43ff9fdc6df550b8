//! Guest repository for database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{count_where, select_where, QueryFilter};
use crate::domain::models::{Guest, GuestContext, GuestType};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "guest";

/// Guest record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestRecord {
    pub uid: String,
    pub session_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub room_number: Option<String>,
    pub guest_type: GuestType,
    pub language: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active: DateTime<Utc>,
}

impl From<GuestRecord> for Guest {
    fn from(record: GuestRecord) -> Self {
        Guest {
            id: record.uid,
            session_id: record.session_id,
            name: record.name,
            email: record.email,
            phone: record.phone,
            room_number: record.room_number,
            guest_type: record.guest_type,
            language: record.language,
            created_at: record.created_at,
            last_active: record.last_active,
        }
    }
}

/// Profile fields editable through `PUT /api/users/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub guest_type: Option<GuestType>,
    #[serde(default)]
    pub language: Option<String>,
}

impl GuestUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.room_number.is_none()
            && self.guest_type.is_none()
            && self.language.is_none()
    }
}

/// Guest repository
pub struct GuestRepository;

impl GuestRepository {
    /// Create a guest for a session from whatever the client told us
    pub async fn create(db: &Database, session_id: &str, context: &GuestContext) -> Result<Guest> {
        let now = Utc::now();
        let record = GuestRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            name: context.name.clone(),
            email: context.email.clone(),
            phone: context.phone.clone(),
            room_number: context.room_number.clone(),
            guest_type: context.guest_type.unwrap_or_default(),
            language: context.language.clone().unwrap_or_else(|| "en".to_string()),
            created_at: now,
            last_active: now,
        };

        let created: Option<GuestRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create guest: {}", e)))?;

        created
            .map(Guest::from)
            .ok_or_else(|| AppError::Database("Failed to create guest".to_string()))
    }

    pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<Guest>> {
        let record: Option<GuestRecord> = db
            .select((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch guest: {}", e)))?;
        Ok(record.map(Guest::from))
    }

    pub async fn find_by_session_id(db: &Database, session_id: &str) -> Result<Option<Guest>> {
        let filter = QueryFilter::new().eq("session_id", Some(session_id));
        let records: Vec<GuestRecord> = select_where(db, TABLE, &filter, " LIMIT 1").await?;
        Ok(records.into_iter().next().map(Guest::from))
    }

    /// Most recently active guest with this phone number
    pub async fn find_by_phone(db: &Database, phone: &str) -> Result<Option<Guest>> {
        let filter = QueryFilter::new().eq("phone", Some(phone));
        let records: Vec<GuestRecord> =
            select_where(db, TABLE, &filter, " ORDER BY last_active DESC LIMIT 1").await?;
        Ok(records.into_iter().next().map(Guest::from))
    }

    pub async fn touch_last_active(db: &Database, id: &str) -> Result<()> {
        let _: Option<GuestRecord> = db
            .update((TABLE, id))
            .merge(json!({ "last_active": Utc::now().timestamp_millis() }))
            .await
            .map_err(|e| AppError::Database(format!("Failed to update guest activity: {}", e)))?;
        Ok(())
    }

    /// Apply the provided profile fields; unset fields are left untouched
    pub async fn update_profile(db: &Database, id: &str, update: GuestUpdate) -> Result<Option<Guest>> {
        if Self::find_by_id(db, id).await?.is_none() {
            return Ok(None);
        }
        if update.is_empty() {
            return Self::find_by_id(db, id).await;
        }

        let mut patch = serde_json::Map::new();
        if let Some(name) = update.name {
            patch.insert("name".into(), json!(name));
        }
        if let Some(email) = update.email {
            patch.insert("email".into(), json!(email));
        }
        if let Some(phone) = update.phone {
            patch.insert("phone".into(), json!(phone));
        }
        if let Some(room_number) = update.room_number {
            patch.insert("room_number".into(), json!(room_number));
        }
        if let Some(guest_type) = update.guest_type {
            patch.insert("guest_type".into(), json!(guest_type));
        }
        if let Some(language) = update.language {
            patch.insert("language".into(), json!(language));
        }

        let updated: Option<GuestRecord> = db
            .update((TABLE, id))
            .merge(serde_json::Value::Object(patch))
            .await
            .map_err(|e| AppError::Database(format!("Failed to update guest: {}", e)))?;
        Ok(updated.map(Guest::from))
    }

    /// Delete a guest; returns whether it existed
    pub async fn delete(db: &Database, id: &str) -> Result<bool> {
        let deleted: Option<GuestRecord> = db
            .delete((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete guest: {}", e)))?;
        Ok(deleted.is_some())
    }

    pub async fn count(db: &Database) -> Result<usize> {
        count_where(db, TABLE, &QueryFilter::new()).await
    }

    pub async fn count_created_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let filter = QueryFilter::new().between("created_at", start, end);
        count_where(db, TABLE, &filter).await
    }
}
