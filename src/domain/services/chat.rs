//! Chat turn orchestration shared by HTTP, WebSocket and voice

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use super::assistant::{Assistant, AssistantReply, AssistantRequest, RuleBasedAssistant};
use super::documents::DocumentService;
use super::intent;
use crate::domain::models::{
    Channel, Conversation, EventType, Guest, GuestContext, Intent, Message, MessageType,
    SenderType, Sentiment,
};
use crate::infrastructure::cache::{ConversationCacheEntry, SessionCache};
use crate::infrastructure::database::repositories::{NewGuestRequest, NewMessage};
use crate::infrastructure::database::{
    AnalyticsRepository, ConversationRepository, Database, GuestRepository, GuestRequestRepository,
    MessageRepository,
};
use crate::realtime::{conversation_room, RealtimeHub, ADMIN_ROOM};
use crate::shared::errors::{AppError, Result};
use crate::shared::logging;

/// Knowledge excerpts passed to the assistant
const KNOWLEDGE_LIMIT: usize = 3;
/// Previous messages passed to the assistant
const HISTORY_LIMIT: usize = 10;

/// One guest message to answer
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub channel: Channel,
    pub guest: GuestContext,
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
}

impl TurnRequest {
    pub fn web(message: impl Into<String>, session_id: Option<String>, guest: GuestContext) -> Self {
        Self {
            message: message.into(),
            session_id,
            channel: Channel::Web,
            guest,
            message_type: MessageType::Text,
            metadata: json!({}),
        }
    }
}

/// Result of a turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub session_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub intent: Intent,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub escalate: bool,
    pub suggested_responses: Vec<String>,
    pub processing_time: f64,
    #[serde(skip)]
    pub user_message: Message,
    #[serde(skip)]
    pub ai_message: Message,
}

/// Runs chat turns against storage, the knowledge base and the assistant
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    cache: SessionCache,
    hub: RealtimeHub,
    documents: DocumentService,
    assistant: Arc<dyn Assistant>,
    fallback: Arc<RuleBasedAssistant>,
}

impl ChatService {
    pub fn new(
        db: Database,
        cache: SessionCache,
        hub: RealtimeHub,
        documents: DocumentService,
        assistant: Arc<dyn Assistant>,
        fallback: Arc<RuleBasedAssistant>,
    ) -> Self {
        Self {
            db,
            cache,
            hub,
            documents,
            assistant,
            fallback,
        }
    }

    pub fn assistant_name(&self) -> &'static str {
        self.assistant.name()
    }

    /// Answer one guest message end to end
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let text = request.message.trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let guest = self
            .resolve_guest(&session_id, request.channel, &request.guest)
            .await?;
        let conversation = self.resolve_conversation(&guest, request.channel).await?;

        let user_message = MessageRepository::create(
            &self.db,
            NewMessage {
                conversation_id: conversation.id.clone(),
                sender_type: SenderType::User,
                sender_id: Some(guest.id.clone()),
                content: text.clone(),
                message_type: request.message_type,
                metadata: request.metadata.clone(),
                intent: None,
                sentiment: None,
                confidence: None,
                processing_time: None,
            },
        )
        .await?;
        self.publish_message(&conversation.id, &user_message);
        self.hub.publish(
            &session_id,
            "ai_typing",
            json!({ "typing": true, "conversation_id": conversation.id }),
        );

        let knowledge = match self.documents.search(&text, None, KNOWLEDGE_LIMIT).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge search failed, answering without it");
                Vec::new()
            }
        };
        let mut history =
            MessageRepository::recent_for_conversation(&self.db, &conversation.id, HISTORY_LIMIT + 1)
                .await?;
        history.retain(|m| m.id != user_message.id);
        history.truncate(HISTORY_LIMIT);

        let assistant_request = AssistantRequest {
            message: text.clone(),
            channel: request.channel,
            guest: request.guest.merged_with(&guest),
            history,
            knowledge,
        };

        let started = Instant::now();
        let reply = self.generate(&conversation.id, &assistant_request).await;
        let processing_time = started.elapsed().as_secs_f64();

        let ai_message = MessageRepository::create(
            &self.db,
            NewMessage {
                conversation_id: conversation.id.clone(),
                sender_type: SenderType::Ai,
                sender_id: None,
                content: reply.response.clone(),
                message_type: MessageType::Text,
                metadata: json!({ "assistant": self.assistant.name() }),
                intent: Some(reply.intent),
                sentiment: Some(reply.sentiment),
                confidence: Some(reply.confidence),
                processing_time: Some(processing_time),
            },
        )
        .await?;

        ConversationRepository::apply_turn_metadata(
            &self.db,
            &conversation.id,
            reply.intent,
            reply.sentiment,
            reply.escalate,
        )
        .await?;

        self.record_side_effects(&guest, &conversation, &text, &reply, processing_time)
            .await?;

        self.hub.publish(
            &session_id,
            "ai_typing",
            json!({ "typing": false, "conversation_id": conversation.id }),
        );
        self.publish_message(&conversation.id, &ai_message);

        let entry = ConversationCacheEntry {
            conversation_id: conversation.id.clone(),
            guest_id: guest.id.clone(),
            last_message: reply.response.clone(),
        };
        if let Err(e) = self.cache.store_conversation(&session_id, &entry).await {
            logging::log_cache_error(&session_id, &e.to_string());
        }

        logging::log_chat_turn(
            request.channel.as_str(),
            &conversation.id,
            reply.intent.as_str(),
            reply.sentiment.as_str(),
            processing_time,
        );

        Ok(TurnOutcome {
            suggested_responses: intent::suggested_responses(reply.intent),
            response: reply.response,
            session_id,
            conversation_id: conversation.id,
            user_id: guest.id,
            intent: reply.intent,
            sentiment: reply.sentiment,
            confidence: reply.confidence,
            escalate: reply.escalate,
            processing_time,
            user_message,
            ai_message,
        })
    }

    async fn resolve_guest(
        &self,
        session_id: &str,
        channel: Channel,
        context: &GuestContext,
    ) -> Result<Guest> {
        let mut existing = GuestRepository::find_by_session_id(&self.db, session_id).await?;
        if existing.is_none() && channel == Channel::Voice {
            if let Some(phone) = context.phone.as_deref() {
                existing = GuestRepository::find_by_phone(&self.db, phone).await?;
            }
        }

        match existing {
            Some(guest) => {
                GuestRepository::touch_last_active(&self.db, &guest.id).await?;
                Ok(guest)
            }
            None => GuestRepository::create(&self.db, session_id, context).await,
        }
    }

    async fn resolve_conversation(&self, guest: &Guest, channel: Channel) -> Result<Conversation> {
        match ConversationRepository::find_active_for_guest(&self.db, &guest.id, Some(channel)).await? {
            Some(conversation) => Ok(conversation),
            None => ConversationRepository::create(&self.db, &guest.id, channel).await,
        }
    }

    /// Primary assistant, falling back to the rule-based one on failure
    async fn generate(&self, conversation_id: &str, request: &AssistantRequest) -> AssistantReply {
        match self.assistant.generate(request).await {
            Ok(reply) => reply,
            Err(e) => {
                logging::log_assistant_fallback(conversation_id, &e.to_string());
                self.fallback.reply(request)
            }
        }
    }

    async fn record_side_effects(
        &self,
        guest: &Guest,
        conversation: &Conversation,
        text: &str,
        reply: &AssistantReply,
        processing_time: f64,
    ) -> Result<()> {
        let channel = conversation.channel.as_str();

        if let Some(request_type) = reply.intent.request_type() {
            let request = GuestRequestRepository::create(
                &self.db,
                NewGuestRequest {
                    conversation_id: Some(conversation.id.clone()),
                    user_id: guest.id.clone(),
                    request_type: request_type.to_string(),
                    title: None,
                    description: text.to_string(),
                    priority: None,
                    room_number: guest.room_number.clone(),
                },
            )
            .await?;
            AnalyticsRepository::record(
                &self.db,
                EventType::GuestRequestRecorded,
                Some(channel),
                1.0,
                json!({ "request_type": request_type, "request_id": request.id }),
            )
            .await?;
        }

        if reply.escalate {
            let reason = intent::escalation_reason(text);
            logging::log_escalation(&conversation.id, &guest.id, reason);
            AnalyticsRepository::record(
                &self.db,
                EventType::Escalation,
                Some(channel),
                1.0,
                json!({ "conversation_id": conversation.id, "reason": reason }),
            )
            .await?;
            self.hub.publish(
                ADMIN_ROOM,
                "escalation_needed",
                json!({
                    "conversation_id": conversation.id,
                    "user_id": guest.id,
                    "message": text,
                    "intent": reply.intent,
                    "sentiment": reply.sentiment,
                }),
            );
        }

        AnalyticsRepository::record(
            &self.db,
            EventType::ChatTurn,
            Some(channel),
            processing_time,
            json!({ "intent": reply.intent, "sentiment": reply.sentiment }),
        )
        .await?;

        Ok(())
    }

    fn publish_message(&self, conversation_id: &str, message: &Message) {
        self.hub.publish(
            &conversation_room(conversation_id),
            "new_message",
            json!({ "message": message, "conversation_id": conversation_id }),
        );
    }

    /// Store a staff reply and push it to the conversation's listeners
    pub async fn post_agent_message(
        &self,
        conversation_id: &str,
        agent_id: &str,
        text: &str,
    ) -> Result<Message> {
        let text = text.trim();
        if conversation_id.trim().is_empty() || text.is_empty() {
            return Err(AppError::Validation(
                "Conversation ID and message are required".to_string(),
            ));
        }
        if ConversationRepository::find_by_id(&self.db, conversation_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Conversation"));
        }

        let mut message = NewMessage::text(conversation_id, SenderType::Agent, text);
        message.sender_id = Some(agent_id.to_string());
        let message = MessageRepository::create(&self.db, message).await?;

        self.hub.publish(
            &conversation_room(conversation_id),
            "agent_message",
            json!({ "message": message }),
        );
        Ok(message)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::HotelInfo;
    use crate::domain::models::{ConversationStatus, Priority, RequestStatus};
    use crate::domain::services::assistant::AssistantError;
    use crate::infrastructure::database::connection::test_database;
    use async_trait::async_trait;

    struct FailingAssistant;

    #[async_trait]
    impl Assistant for FailingAssistant {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate(&self, _: &AssistantRequest) -> std::result::Result<AssistantReply, AssistantError> {
            Err(AssistantError::ParseError("boom".to_string()))
        }
    }

    pub(crate) async fn service_with(db: Database, hub: RealtimeHub, assistant: Arc<dyn Assistant>) -> ChatService {
        let dir = std::env::temp_dir().join(format!("hotel-desk-chat-{}", uuid::Uuid::new_v4()));
        ChatService::new(
            db.clone(),
            SessionCache::in_memory(),
            hub,
            DocumentService::new(db, dir),
            assistant,
            Arc::new(RuleBasedAssistant::new(HotelInfo::default())),
        )
    }

    async fn service(db: Database, hub: RealtimeHub) -> ChatService {
        service_with(db, hub, Arc::new(RuleBasedAssistant::new(HotelInfo::default()))).await
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let db = test_database().await;
        let chat = service(db, RealtimeHub::new()).await;
        let result = chat.handle_turn(TurnRequest::web("   ", None, GuestContext::default())).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_turn_persists_and_reuses_conversation() {
        let db = test_database().await;
        let chat = service(db.clone(), RealtimeHub::new()).await;

        let first = chat
            .handle_turn(TurnRequest::web("Hello!", None, GuestContext::default()))
            .await
            .unwrap();
        assert_eq!(first.intent, Intent::Greeting);
        assert!(!first.session_id.is_empty());
        assert_eq!(first.suggested_responses.len(), 3);

        let second = chat
            .handle_turn(TurnRequest::web(
                "What time is breakfast?",
                Some(first.session_id.clone()),
                GuestContext::default(),
            ))
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(second.intent, Intent::Dining);

        let messages = MessageRepository::list_for_conversation(&db, &first.conversation_id, None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].sender_type, SenderType::Ai);
        assert!(messages[1].processing_time.is_some());

        let conversation = ConversationRepository::find_by_id(&db, &first.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.category, Some(Intent::Dining));
    }

    #[tokio::test]
    async fn test_service_intent_records_guest_request() {
        let db = test_database().await;
        let chat = service(db.clone(), RealtimeHub::new()).await;
        let context = GuestContext {
            room_number: Some("415".to_string()),
            ..Default::default()
        };

        let outcome = chat
            .handle_turn(TurnRequest::web("Could I get extra towels please", None, context))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::Housekeeping);

        let requests = GuestRequestRepository::list(&db, Some(RequestStatus::Pending), None)
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request_type, "housekeeping");
        assert_eq!(requests[0].room_number.as_deref(), Some("415"));
    }

    #[tokio::test]
    async fn test_escalation_notifies_admin_room() {
        let db = test_database().await;
        let hub = RealtimeHub::new();
        let mut admin = hub.subscribe(ADMIN_ROOM);
        let chat = service(db.clone(), hub).await;

        let outcome = chat
            .handle_turn(TurnRequest::web(
                "This is unacceptable, I want to speak to a manager",
                None,
                GuestContext::default(),
            ))
            .await
            .unwrap();
        assert!(outcome.escalate);

        let envelope = admin.recv().await.unwrap();
        assert_eq!(envelope.frame.event, "escalation_needed");
        assert_eq!(envelope.frame.data["conversation_id"], outcome.conversation_id.as_str());

        let conversation = ConversationRepository::find_by_id(&db, &outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.priority, Priority::High);
        assert_eq!(conversation.status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn test_failing_assistant_falls_back() {
        let db = test_database().await;
        let chat = service_with(db, RealtimeHub::new(), Arc::new(FailingAssistant)).await;
        let outcome = chat
            .handle_turn(TurnRequest::web("Is there parking?", None, GuestContext::default()))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::Amenities);
        assert!(!outcome.response.is_empty());
    }

    #[tokio::test]
    async fn test_turn_caches_conversation() {
        let db = test_database().await;
        let chat = service(db, RealtimeHub::new()).await;
        let outcome = chat
            .handle_turn(TurnRequest::web("hi", Some("sess-1".to_string()), GuestContext::default()))
            .await
            .unwrap();

        let cached = chat.cache.conversation("sess-1").await.unwrap().unwrap();
        assert_eq!(cached.conversation_id, outcome.conversation_id);
        assert_eq!(cached.last_message, outcome.response);
    }

    #[tokio::test]
    async fn test_voice_guest_matched_by_phone() {
        let db = test_database().await;
        let chat = service(db, RealtimeHub::new()).await;

        let mut first = TurnRequest::web("hello", Some("CA1".to_string()), GuestContext::with_phone("+1555"));
        first.channel = Channel::Voice;
        let first = chat.handle_turn(first).await.unwrap();

        let mut second = TurnRequest::web("hello again", Some("CA2".to_string()), GuestContext::with_phone("+1555"));
        second.channel = Channel::Voice;
        let second = chat.handle_turn(second).await.unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.conversation_id, second.conversation_id);
    }

    #[tokio::test]
    async fn test_agent_message_published() {
        let db = test_database().await;
        let hub = RealtimeHub::new();
        let chat = service(db, hub.clone()).await;
        let outcome = chat
            .handle_turn(TurnRequest::web("hi", None, GuestContext::default()))
            .await
            .unwrap();

        let mut room = hub.subscribe(&conversation_room(&outcome.conversation_id));
        let message = chat
            .post_agent_message(&outcome.conversation_id, "agent-1", "Happy to help")
            .await
            .unwrap();
        assert_eq!(message.sender_type, SenderType::Agent);
        assert_eq!(message.sender_id.as_deref(), Some("agent-1"));

        let envelope = room.recv().await.unwrap();
        assert_eq!(envelope.frame.event, "agent_message");

        assert!(matches!(
            chat.post_agent_message("missing", "agent-1", "hello").await,
            Err(AppError::NotFound(_))
        ));
    }
}
