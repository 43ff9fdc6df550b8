//! Shared application state handed to every handler

use std::sync::Arc;

use crate::config::Settings;
use crate::domain::services::{
    AnalyticsService, Assistant, ChatService, DocumentService, GeminiAssistant, RuleBasedAssistant,
    VoiceService,
};
use crate::infrastructure::cache::SessionCache;
use crate::infrastructure::database::{init_database, Database};
use crate::realtime::RealtimeHub;
use crate::shared::errors::Result;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: Database,
    pub cache: SessionCache,
    pub hub: RealtimeHub,
    pub chat: ChatService,
    pub documents: DocumentService,
    pub analytics: AnalyticsService,
    pub voice: VoiceService,
}

impl AppState {
    /// Connect to storage and wire up the services
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = init_database(&settings).await?;
        let cache = SessionCache::connect(&settings.redis_url).await;
        Self::assemble(settings, db, cache)
    }

    /// Wire services over already-open connections
    pub fn assemble(settings: Settings, db: Database, cache: SessionCache) -> Result<Self> {
        let hub = RealtimeHub::new();
        let documents = DocumentService::new(db.clone(), settings.upload_dir.clone());
        let fallback = Arc::new(RuleBasedAssistant::new(settings.hotel.clone()));

        let assistant: Arc<dyn Assistant> = match settings.google_api_key.as_deref() {
            Some(key) => Arc::new(GeminiAssistant::new(
                key,
                settings.gemini_model.clone(),
                settings.hotel.clone(),
            )?),
            None => {
                tracing::warn!("GOOGLE_API_KEY not set, answering with rule-based replies only");
                Arc::new(RuleBasedAssistant::new(settings.hotel.clone()))
            }
        };

        let chat = ChatService::new(
            db.clone(),
            cache.clone(),
            hub.clone(),
            documents.clone(),
            assistant,
            fallback,
        );
        let voice = VoiceService::new(db.clone(), chat.clone(), settings.hotel.clone());

        Ok(Self {
            analytics: AnalyticsService::new(db.clone()),
            settings: Arc::new(settings),
            db,
            cache,
            hub,
            chat,
            documents,
            voice,
        })
    }

    /// In-memory database and cache, rule-based assistant
    #[cfg(test)]
    pub async fn for_testing() -> Self {
        let mut settings = Settings::for_testing();
        settings.google_api_key = None;
        settings.upload_dir = std::env::temp_dir().join(format!("hotel-desk-{}", uuid::Uuid::new_v4()));
        let db = crate::infrastructure::database::connection::test_database().await;
        Self::assemble(settings, db, SessionCache::in_memory())
            .expect("rule-based state should assemble")
    }
}
