use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

str_enum! {
    /// Urgency of a guest service request
    RequestPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

str_enum! {
    /// Fulfilment state of a guest service request
    RequestStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

/// Service request raised by a guest (room service, housekeeping, repairs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestRequest {
    pub id: String,
    pub conversation_id: Option<String>,
    pub user_id: String,
    pub request_type: String,
    pub title: String,
    pub description: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub room_number: Option<String>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
