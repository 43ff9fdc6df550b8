// Business logic services
// Storage goes through the repositories; HTTP and WebSocket stay in handlers

pub mod intent;
pub mod assistant;
pub mod documents;
pub mod chat;
pub mod analytics;
pub mod voice;

pub use assistant::{Assistant, AssistantError, GeminiAssistant, RuleBasedAssistant};
pub use analytics::AnalyticsService;
pub use chat::{ChatService, TurnOutcome, TurnRequest};
pub use documents::DocumentService;
pub use voice::{CallParams, VoiceResponse, VoiceService};
