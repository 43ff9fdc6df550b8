use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

str_enum! {
    /// Who authored a message
    SenderType {
        User => "user",
        Ai => "ai",
        Agent => "agent",
        System => "system",
    }
}

str_enum! {
    /// Transport of the original message
    MessageType {
        Text => "text",
        Audio => "audio",
    }
}

str_enum! {
    /// What the guest is asking about
    Intent {
        Greeting => "greeting",
        Booking => "booking",
        CheckInOut => "check_in_out",
        RoomService => "room_service",
        Housekeeping => "housekeeping",
        Maintenance => "maintenance",
        Amenities => "amenities",
        Dining => "dining",
        Billing => "billing",
        Complaint => "complaint",
        Inquiry => "inquiry",
    }
}

impl Intent {
    /// Guest-request type recorded for service intents
    pub fn request_type(&self) -> Option<&'static str> {
        match self {
            Intent::RoomService => Some("room_service"),
            Intent::Housekeeping => Some("housekeeping"),
            Intent::Maintenance => Some("maintenance"),
            _ => None,
        }
    }
}

str_enum! {
    /// Tone of the guest's message
    Sentiment {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    pub confidence: Option<f64>,
    /// Seconds spent generating an AI reply
    pub processing_time: Option<f64>,
    pub created_at: DateTime<Utc>,
}
