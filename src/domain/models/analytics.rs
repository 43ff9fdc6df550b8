use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

str_enum! {
    /// Kinds of analytics events the service records
    EventType {
        ChatTurn => "chat_turn",
        GuestRequestRecorded => "guest_request_recorded",
        Escalation => "escalation",
        VoiceCall => "voice_call",
        DocumentProcessed => "document_processed",
    }
}

/// A recorded analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_type: EventType,
    pub channel: Option<String>,
    pub value: f64,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Today's metrics for `GET /api/analytics/dashboard`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardAnalytics {
    pub total_conversations: usize,
    pub active_conversations: usize,
    pub closed_conversations: usize,
    pub total_messages: usize,
    pub avg_response_time: f64,
    pub new_users: usize,
    pub intent_distribution: BTreeMap<String, usize>,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub escalation_rate: f64,
    pub total_guest_requests: usize,
    pub avg_conversation_length: f64,
    pub top_intents: BTreeMap<String, usize>,
    pub top_requests: BTreeMap<String, usize>,
}

/// Headline numbers for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_conversations: usize,
    pub active_conversations: usize,
    pub total_users: usize,
    pub total_messages: usize,
    pub today_conversations: usize,
    pub today_resolved: usize,
    pub avg_response_time: f64,
    pub avg_satisfaction: f64,
}

/// One series of a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: Vec<usize>,
    #[serde(rename = "borderColor", skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(rename = "backgroundColor")]
    pub background_color: Vec<String>,
}

/// Chart.js-shaped data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

/// Data behind the admin conversation charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCharts {
    pub daily_conversations: ChartData,
    pub channel_distribution: ChartData,
    pub intent_distribution: ChartData,
}
