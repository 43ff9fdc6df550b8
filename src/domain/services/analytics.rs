//! Dashboard aggregation
//!
//! The aggregation functions are pure over records already fetched from
//! storage; `AnalyticsService` does the fetching.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::domain::models::{
    AdminStats, AnalyticsEvent, ChartData, ChartDataset, Conversation, ConversationCharts,
    ConversationStatus, DashboardAnalytics, EventType, Message, Priority, SenderType,
};
use crate::infrastructure::database::{
    AnalyticsRepository, ConversationRepository, Database, GuestRepository, MessageRepository,
};
use crate::shared::errors::Result;

const TOP_N: usize = 5;
const CHART_DAYS: i64 = 7;

const CHANNEL_COLORS: &[&str] = &[
    "rgba(255, 99, 132, 0.8)",
    "rgba(54, 162, 235, 0.8)",
    "rgba(255, 205, 86, 0.8)",
];

const CATEGORY_COLORS: &[&str] = &[
    "rgba(255, 99, 132, 0.8)",
    "rgba(54, 162, 235, 0.8)",
    "rgba(255, 205, 86, 0.8)",
    "rgba(75, 192, 192, 0.8)",
    "rgba(153, 102, 255, 0.8)",
];

/// Start and end (exclusive) of the UTC day containing `now`
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// The `n` highest counts, ties broken by name
fn top(distribution: &BTreeMap<String, usize>, n: usize) -> BTreeMap<String, usize> {
    let mut entries: Vec<(&String, &usize)> = distribution.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(n)
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

fn ai_messages(messages: &[Message]) -> impl Iterator<Item = &Message> {
    messages.iter().filter(|m| m.sender_type == SenderType::Ai)
}

/// Everything `dashboard` needs for one day
#[derive(Debug, Default)]
pub struct DashboardInput {
    pub conversations_today: Vec<Conversation>,
    pub active_conversations: usize,
    pub resolved_conversations: usize,
    pub messages_today: Vec<Message>,
    pub new_guests: usize,
    pub request_events: Vec<AnalyticsEvent>,
    /// Message count per conversation created today
    pub message_counts: HashMap<String, usize>,
}

pub fn dashboard(input: &DashboardInput) -> DashboardAnalytics {
    let mut intent_distribution = BTreeMap::new();
    let mut sentiment_distribution = BTreeMap::new();
    for message in ai_messages(&input.messages_today) {
        if let Some(intent) = message.intent {
            *intent_distribution.entry(intent.as_str().to_string()).or_insert(0) += 1;
        }
        if let Some(sentiment) = message.sentiment {
            *sentiment_distribution.entry(sentiment.as_str().to_string()).or_insert(0) += 1;
        }
    }

    let mut request_distribution = BTreeMap::new();
    for event in &input.request_events {
        if let Some(kind) = event.metadata.get("request_type").and_then(|v| v.as_str()) {
            *request_distribution.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    let total_conversations = input.conversations_today.len();
    let escalated = input
        .conversations_today
        .iter()
        .filter(|c| c.priority == Priority::High)
        .count();
    let escalation_rate = if total_conversations > 0 {
        escalated as f64 / total_conversations as f64 * 100.0
    } else {
        0.0
    };

    let avg_conversation_length = mean(
        input
            .conversations_today
            .iter()
            .map(|c| input.message_counts.get(&c.id).copied().unwrap_or(0) as f64),
    );

    DashboardAnalytics {
        total_conversations,
        active_conversations: input.active_conversations,
        closed_conversations: input.resolved_conversations,
        total_messages: input.messages_today.len(),
        avg_response_time: round_to(
            mean(ai_messages(&input.messages_today).filter_map(|m| m.processing_time)),
            2,
        ),
        new_users: input.new_guests,
        top_intents: top(&intent_distribution, TOP_N),
        top_requests: top(&request_distribution, TOP_N),
        intent_distribution,
        sentiment_distribution,
        escalation_rate: round_to(escalation_rate, 2),
        total_guest_requests: input.request_events.len(),
        avg_conversation_length: round_to(avg_conversation_length, 2),
    }
}

/// Everything `admin_stats` needs
#[derive(Debug, Default)]
pub struct AdminStatsInput {
    pub total_conversations: usize,
    pub active_conversations: usize,
    pub total_users: usize,
    pub total_messages: usize,
    pub today_conversations: usize,
    pub today_resolved: usize,
    /// Messages from the last 24 hours
    pub recent_messages: Vec<Message>,
    pub satisfaction_scores: Vec<u8>,
}

pub fn admin_stats(input: &AdminStatsInput) -> AdminStats {
    AdminStats {
        total_conversations: input.total_conversations,
        active_conversations: input.active_conversations,
        total_users: input.total_users,
        total_messages: input.total_messages,
        today_conversations: input.today_conversations,
        today_resolved: input.today_resolved,
        avg_response_time: round_to(
            mean(ai_messages(&input.recent_messages).filter_map(|m| m.processing_time)),
            2,
        ),
        avg_satisfaction: round_to(
            mean(input.satisfaction_scores.iter().map(|s| f64::from(*s))),
            1,
        ),
    }
}

fn distribution_chart(counts: BTreeMap<String, usize>, colors: &[&str]) -> ChartData {
    let (labels, data): (Vec<String>, Vec<usize>) = counts.into_iter().unzip();
    ChartData {
        labels,
        datasets: vec![ChartDataset {
            label: None,
            data,
            border_color: None,
            background_color: colors.iter().map(|c| c.to_string()).collect(),
        }],
    }
}

/// Seven-day trend plus channel and category breakdowns
pub fn conversation_charts(now: DateTime<Utc>, conversations: &[Conversation]) -> ConversationCharts {
    let today = now.date_naive();
    let days: Vec<_> = (0..CHART_DAYS)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .collect();

    let created: Vec<usize> = days
        .iter()
        .map(|day| conversations.iter().filter(|c| c.created_at.date_naive() == *day).count())
        .collect();
    let resolved: Vec<usize> = days
        .iter()
        .map(|day| {
            conversations
                .iter()
                .filter(|c| c.resolved_at.map(|at| at.date_naive()) == Some(*day))
                .count()
        })
        .collect();

    let mut channels = BTreeMap::new();
    let mut categories = BTreeMap::new();
    for conversation in conversations {
        *channels.entry(conversation.channel.as_str().to_string()).or_insert(0) += 1;
        if let Some(category) = conversation.category {
            *categories.entry(category.as_str().to_string()).or_insert(0) += 1;
        }
    }

    ConversationCharts {
        daily_conversations: ChartData {
            labels: days.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
            datasets: vec![
                ChartDataset {
                    label: Some("New Conversations".to_string()),
                    data: created,
                    border_color: Some("rgb(75, 192, 192)".to_string()),
                    background_color: vec!["rgba(75, 192, 192, 0.2)".to_string()],
                },
                ChartDataset {
                    label: Some("Resolved Conversations".to_string()),
                    data: resolved,
                    border_color: Some("rgb(54, 162, 235)".to_string()),
                    background_color: vec!["rgba(54, 162, 235, 0.2)".to_string()],
                },
            ],
        },
        channel_distribution: distribution_chart(channels, CHANNEL_COLORS),
        intent_distribution: distribution_chart(categories, CATEGORY_COLORS),
    }
}

/// Loads records and runs the aggregations
#[derive(Clone)]
pub struct AnalyticsService {
    db: Database,
}

impl AnalyticsService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardAnalytics> {
        let (start, end) = day_bounds(now);
        let conversations_today = ConversationRepository::created_between(&self.db, start, end).await?;
        let ids = conversations_today.iter().map(|c| c.id.clone()).collect();

        let input = DashboardInput {
            message_counts: MessageRepository::count_by_conversation(&self.db, ids).await?,
            active_conversations: ConversationRepository::count_by_status(
                &self.db,
                Some(ConversationStatus::Active),
            )
            .await?,
            resolved_conversations: ConversationRepository::count_by_status(
                &self.db,
                Some(ConversationStatus::Resolved),
            )
            .await?,
            messages_today: MessageRepository::created_between(&self.db, start, end, None).await?,
            new_guests: GuestRepository::count_created_between(&self.db, start, end).await?,
            request_events: AnalyticsRepository::between(
                &self.db,
                start,
                end,
                Some(EventType::GuestRequestRecorded),
            )
            .await?,
            conversations_today,
        };
        Ok(dashboard(&input))
    }

    pub async fn admin_stats(&self, now: DateTime<Utc>) -> Result<AdminStats> {
        let (start, end) = day_bounds(now);
        let conversations = ConversationRepository::all(&self.db).await?;

        let input = AdminStatsInput {
            total_conversations: conversations.len(),
            active_conversations: conversations
                .iter()
                .filter(|c| c.status == ConversationStatus::Active)
                .count(),
            total_users: GuestRepository::count(&self.db).await?,
            total_messages: MessageRepository::count(&self.db).await?,
            today_conversations: conversations
                .iter()
                .filter(|c| c.created_at >= start && c.created_at < end)
                .count(),
            today_resolved: ConversationRepository::resolved_between(&self.db, start, end)
                .await?
                .len(),
            recent_messages: MessageRepository::created_between(
                &self.db,
                now - Duration::days(1),
                now + Duration::seconds(1),
                Some(SenderType::Ai),
            )
            .await?,
            satisfaction_scores: conversations.iter().filter_map(|c| c.satisfaction_score).collect(),
        };
        Ok(admin_stats(&input))
    }

    pub async fn conversation_charts(&self, now: DateTime<Utc>) -> Result<ConversationCharts> {
        let conversations = ConversationRepository::all(&self.db).await?;
        Ok(conversation_charts(now, &conversations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Channel, Intent, MessageType, Sentiment};
    use crate::infrastructure::database::connection::test_database;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn conversation(id: &str, created: DateTime<Utc>) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: "g1".to_string(),
            channel: Channel::Web,
            status: ConversationStatus::Active,
            priority: Priority::Normal,
            category: None,
            sentiment: None,
            satisfaction_score: None,
            agent_id: None,
            created_at: created,
            updated_at: created,
            resolved_at: None,
        }
    }

    fn ai_message(intent: Intent, sentiment: Sentiment, time: f64) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "c1".to_string(),
            sender_type: SenderType::Ai,
            sender_id: None,
            content: "ok".to_string(),
            message_type: MessageType::Text,
            metadata: json!({}),
            intent: Some(intent),
            sentiment: Some(sentiment),
            confidence: Some(0.8),
            processing_time: Some(time),
            created_at: at(10, 9),
        }
    }

    fn request_event(kind: &str) -> AnalyticsEvent {
        AnalyticsEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: EventType::GuestRequestRecorded,
            channel: Some("web".to_string()),
            value: 1.0,
            metadata: json!({ "request_type": kind }),
            timestamp: at(10, 9),
        }
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = day_bounds(at(10, 15));
        assert_eq!(start, at(10, 0));
        assert_eq!(end, at(11, 0));
    }

    #[test]
    fn test_dashboard_aggregates() {
        let mut escalated = conversation("c2", at(10, 8));
        escalated.priority = Priority::High;

        let mut user = ai_message(Intent::Dining, Sentiment::Neutral, 0.0);
        user.sender_type = SenderType::User;
        user.processing_time = None;

        let input = DashboardInput {
            conversations_today: vec![conversation("c1", at(10, 7)), escalated],
            active_conversations: 5,
            resolved_conversations: 2,
            messages_today: vec![
                ai_message(Intent::Dining, Sentiment::Positive, 1.0),
                ai_message(Intent::Dining, Sentiment::Neutral, 2.0),
                ai_message(Intent::Housekeeping, Sentiment::Neutral, 3.0),
                user,
            ],
            new_guests: 3,
            request_events: vec![
                request_event("housekeeping"),
                request_event("housekeeping"),
                request_event("room_service"),
            ],
            message_counts: HashMap::from([("c1".to_string(), 4), ("c2".to_string(), 1)]),
        };

        let stats = dashboard(&input);
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.avg_response_time, 2.0);
        assert_eq!(stats.escalation_rate, 50.0);
        assert_eq!(stats.avg_conversation_length, 2.5);
        assert_eq!(stats.intent_distribution["dining"], 2);
        assert_eq!(stats.sentiment_distribution["neutral"], 2);
        assert_eq!(stats.top_intents["dining"], 2);
        assert_eq!(stats.top_requests["housekeeping"], 2);
        assert_eq!(stats.total_guest_requests, 3);
    }

    #[test]
    fn test_dashboard_serializes_top_counts_as_objects() {
        let input = DashboardInput {
            messages_today: vec![
                ai_message(Intent::Dining, Sentiment::Neutral, 1.0),
                ai_message(Intent::Dining, Sentiment::Neutral, 1.0),
                ai_message(Intent::Billing, Sentiment::Neutral, 1.0),
                ai_message(Intent::Complaint, Sentiment::Neutral, 1.0),
                ai_message(Intent::Greeting, Sentiment::Neutral, 1.0),
                ai_message(Intent::Amenities, Sentiment::Neutral, 1.0),
                ai_message(Intent::Inquiry, Sentiment::Neutral, 1.234),
            ],
            request_events: vec![request_event("housekeeping")],
            ..Default::default()
        };

        let stats = dashboard(&input);
        assert_eq!(stats.avg_response_time, 1.03);
        assert_eq!(stats.top_intents.len(), 5);
        assert_eq!(stats.top_intents["dining"], 2);
        assert!(!stats.top_intents.contains_key("inquiry"));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["top_intents"]["dining"], 2);
        assert_eq!(json["top_requests"], serde_json::json!({"housekeeping": 1}));
    }

    #[test]
    fn test_dashboard_empty_day() {
        let stats = dashboard(&DashboardInput::default());
        assert_eq!(stats.escalation_rate, 0.0);
        assert_eq!(stats.avg_response_time, 0.0);
        assert!(stats.top_intents.is_empty());
    }

    #[test]
    fn test_admin_stats_rounding() {
        let input = AdminStatsInput {
            recent_messages: vec![
                ai_message(Intent::Inquiry, Sentiment::Neutral, 1.0),
                ai_message(Intent::Inquiry, Sentiment::Neutral, 1.234),
            ],
            satisfaction_scores: vec![4, 5, 5],
            ..Default::default()
        };
        let stats = admin_stats(&input);
        assert_eq!(stats.avg_response_time, 1.12);
        assert_eq!(stats.avg_satisfaction, 4.7);
    }

    #[test]
    fn test_charts_cover_seven_days_chronologically() {
        let mut resolved = conversation("c2", at(8, 10));
        resolved.resolved_at = Some(at(9, 10));
        resolved.category = Some(Intent::Billing);
        let mut voice = conversation("c3", at(10, 10));
        voice.channel = Channel::Voice;

        let charts = conversation_charts(at(10, 12), &[conversation("c1", at(10, 9)), resolved, voice]);

        let daily = &charts.daily_conversations;
        assert_eq!(daily.labels.len(), 7);
        assert_eq!(daily.labels[0], "2024-03-04");
        assert_eq!(daily.labels[6], "2024-03-10");
        assert_eq!(daily.datasets[0].data, vec![0, 0, 0, 0, 1, 0, 2]);
        assert_eq!(daily.datasets[1].data, vec![0, 0, 0, 0, 0, 1, 0]);

        assert_eq!(charts.channel_distribution.labels, vec!["voice", "web"]);
        assert_eq!(charts.channel_distribution.datasets[0].data, vec![1, 2]);
        assert_eq!(charts.intent_distribution.labels, vec!["billing"]);
    }

    #[tokio::test]
    async fn test_service_reads_from_storage() {
        let db = test_database().await;
        let conversation = ConversationRepository::create(&db, "g1", Channel::Web).await.unwrap();
        ConversationRepository::resolve(&db, &conversation.id, Some(4)).await.unwrap();
        GuestRepository::create(&db, "s1", &Default::default()).await.unwrap();

        let service = AnalyticsService::new(db);
        let now = Utc::now();

        let dashboard = service.dashboard(now).await.unwrap();
        assert_eq!(dashboard.total_conversations, 1);
        assert_eq!(dashboard.closed_conversations, 1);
        assert_eq!(dashboard.new_users, 1);

        let stats = service.admin_stats(now).await.unwrap();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.today_resolved, 1);
        assert_eq!(stats.avg_satisfaction, 4.0);

        let charts = service.conversation_charts(now).await.unwrap();
        assert_eq!(charts.daily_conversations.datasets[0].data[6], 1);
    }
}
