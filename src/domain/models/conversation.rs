use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Intent, Message, Sentiment};

str_enum! {
    /// Contact channel a conversation arrived on
    Channel {
        Web => "web",
        Voice => "voice",
        Sms => "sms",
    }
}

str_enum! {
    /// Conversation lifecycle
    ConversationStatus {
        Active => "active",
        Escalated => "escalated",
        Resolved => "resolved",
    }
}

str_enum! {
    /// Conversation priority in the staff queue
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
    }
}

/// Conversation between a guest and the service desk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub priority: Priority,
    /// Intent of the most recent AI turn
    pub category: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    pub satisfaction_score: Option<u8>,
    pub agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Conversation together with its transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub message_count: usize,
}
