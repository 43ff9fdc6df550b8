//! AI concierge
//!
//! `GeminiAssistant` asks Google's Gemini API for a JSON reply;
//! `RuleBasedAssistant` answers from templates and is also the fallback when
//! the model call fails.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::intent;
use crate::config::HotelInfo;
use crate::domain::models::{Channel, GuestContext, Intent, Message, SearchHit, SenderType, Sentiment};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Everything the assistant sees for one turn
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub message: String,
    pub channel: Channel,
    pub guest: GuestContext,
    /// Recent turns, oldest first
    pub history: Vec<Message>,
    pub knowledge: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub response: String,
    pub intent: Intent,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub escalate: bool,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError>;
}

/// Template answers keyed by intent
pub struct RuleBasedAssistant {
    hotel: HotelInfo,
}

impl RuleBasedAssistant {
    pub fn new(hotel: HotelInfo) -> Self {
        Self { hotel }
    }

    /// Synchronous reply; never fails
    pub fn reply(&self, request: &AssistantRequest) -> AssistantReply {
        let (intent, confidence) = intent::classify(&request.message);
        let sentiment = intent::analyze_sentiment(&request.message);
        let escalate = intent::should_escalate(&request.message, intent, sentiment);

        let mut response = if escalate {
            format!(
                "I'm sorry for the trouble. I'm connecting you with a member of our staff who will \
                 be with you shortly. You can also reach the front desk at {}.",
                self.hotel.phone
            )
        } else {
            self.template(intent, &request.guest)
        };

        if !escalate {
            if let Some(hit) = request.knowledge.first() {
                response.push_str(&format!(
                    "\n\nFrom our {}: {}",
                    hit.document_title,
                    excerpt(&hit.content, 300)
                ));
            }
        }

        AssistantReply {
            response,
            intent,
            sentiment,
            confidence,
            escalate,
        }
    }

    fn template(&self, intent: Intent, guest: &GuestContext) -> String {
        let hotel = &self.hotel;
        let room = guest
            .room_number
            .as_deref()
            .map(|r| format!(" to room {}", r))
            .unwrap_or_default();

        match intent {
            Intent::Greeting => {
                let name = guest.name.as_deref().map(|n| format!(", {}", n)).unwrap_or_default();
                format!(
                    "Hello{}! Welcome to {}. I'm your virtual concierge. How can I help you today?",
                    name, hotel.name
                )
            }
            Intent::Booking => format!(
                "I'd be happy to help with your reservation. Please share your dates and number \
                 of guests, or call us at {} to book directly.",
                hotel.phone
            ),
            Intent::CheckInOut => "Check-in starts at 3:00 PM and check-out is at 11:00 AM. \
                 Let me know if you'd like to request an early check-in or late check-out."
                .to_string(),
            Intent::RoomService => format!(
                "I've passed your order{} on to room service. They'll confirm the details and \
                 delivery time shortly.",
                room
            ),
            Intent::Housekeeping => format!(
                "I've let housekeeping know{}. Someone will take care of it as soon as possible.",
                room
            ),
            Intent::Maintenance => format!(
                "Sorry about that. I've reported the issue{} to our maintenance team and they'll \
                 be in touch shortly.",
                room
            ),
            Intent::Amenities => format!(
                "{} offers complimentary Wi-Fi, a fitness center, a pool and on-site parking. \
                 Is there a particular amenity you'd like to know more about?",
                hotel.name
            ),
            Intent::Dining => "Our restaurant serves breakfast from 6:30 to 10:30 AM and dinner \
                 from 6:00 to 10:00 PM. Room service is available around the clock."
                .to_string(),
            Intent::Billing => format!(
                "For questions about your bill, our front desk can go through the charges with \
                 you. You can reach them at {} or {}.",
                hotel.phone, hotel.email
            ),
            Intent::Complaint => "I'm sorry to hear that. Could you tell me a bit more so I can \
                 make sure it gets resolved?"
                .to_string(),
            Intent::Inquiry => format!(
                "Thanks for your question. I can help with reservations, room service, \
                 housekeeping, dining and hotel amenities. For anything else, the front desk at \
                 {} is happy to help.",
                hotel.phone
            ),
        }
    }
}

#[async_trait]
impl Assistant for RuleBasedAssistant {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    async fn generate(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError> {
        Ok(self.reply(request))
    }
}

/// Gemini API client
pub struct GeminiAssistant {
    endpoint: String,
    model: String,
    api_key: String,
    hotel: HotelInfo,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// JSON object the model is asked to produce
#[derive(Debug, Default, Deserialize)]
struct ModelReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "requires_escalation")]
    escalate: Option<bool>,
}

impl GeminiAssistant {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        hotel: HotelInfo,
    ) -> Result<Self, AssistantError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            endpoint: GEMINI_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            hotel,
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_prompt(&self, request: &AssistantRequest) -> String {
        let hotel = &self.hotel;
        let mut prompt = format!(
            "You are the virtual concierge of {name}, {address}. Front desk phone: {phone}, \
             email: {email}.\nAnswer guests politely and concisely. Never invent prices or \
             availability; refer the guest to the front desk instead.\n",
            name = hotel.name,
            address = hotel.address,
            phone = hotel.phone,
            email = hotel.email,
        );

        if request.channel == Channel::Voice {
            prompt.push_str("The guest is on the phone: keep the answer to two short sentences.\n");
        }

        let guest = &request.guest;
        let mut details = Vec::new();
        if let Some(name) = &guest.name {
            details.push(format!("name {}", name));
        }
        if let Some(room) = &guest.room_number {
            details.push(format!("room {}", room));
        }
        if let Some(guest_type) = guest.guest_type {
            details.push(format!("type {}", guest_type));
        }
        if let Some(language) = &guest.language {
            details.push(format!("preferred language {}", language));
        }
        if !details.is_empty() {
            prompt.push_str(&format!("\nGuest: {}\n", details.join(", ")));
        }

        if !request.knowledge.is_empty() {
            prompt.push_str("\nRelevant hotel information:\n");
            for hit in &request.knowledge {
                prompt.push_str(&format!(
                    "- [{}] {}\n",
                    hit.document_title,
                    excerpt(&hit.content, 600)
                ));
            }
        }

        if !request.history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for message in &request.history {
                let speaker = match message.sender_type {
                    SenderType::User => "Guest",
                    SenderType::Ai => "Concierge",
                    SenderType::Agent => "Staff",
                    SenderType::System => "System",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, message.content));
            }
        }

        let intents: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
        prompt.push_str(&format!(
            "\nGuest message: {}\n\nRespond with a JSON object with keys \"response\" (your reply), \
             \"intent\" (one of: {}), \"sentiment\" (positive, neutral or negative), \
             \"confidence\" (0 to 1) and \"escalate\" (true if a human should take over).",
            request.message,
            intents.join(", ")
        ));

        prompt
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: self.build_prompt(request),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 1024,
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.model, "Sending prompt to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::ParseError(e.without_url().to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        debug!("Received response from Gemini ({} chars)", text.len());

        parse_model_reply(&text, &request.message)
    }
}

/// Turn model output into a reply, filling gaps from keyword analysis
pub fn parse_model_reply(raw: &str, message: &str) -> Result<AssistantReply, AssistantError> {
    let cleaned = strip_code_fences(raw);
    let json_slice = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned,
    };

    let model: ModelReply = match serde_json::from_str(json_slice) {
        Ok(model) => model,
        Err(_) => ModelReply {
            response: Some(cleaned.to_string()),
            ..Default::default()
        },
    };

    let response = model
        .response
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AssistantError::ParseError("model returned an empty reply".to_string()))?;

    let (fallback_intent, fallback_confidence) = intent::classify(message);
    let intent = model
        .intent
        .and_then(|i| Intent::from_str(&i).ok())
        .unwrap_or(fallback_intent);
    let sentiment = model
        .sentiment
        .and_then(|s| Sentiment::from_str(&s).ok())
        .unwrap_or_else(|| intent::analyze_sentiment(message));
    let confidence = model
        .confidence
        .filter(|c| (0.0..=1.0).contains(c))
        .unwrap_or(fallback_confidence);
    let escalate = model
        .escalate
        .unwrap_or_else(|| intent::should_escalate(message, intent, sentiment));

    Ok(AssistantReply {
        response,
        intent,
        sentiment,
        confidence,
        escalate,
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// First `max` characters of `text`, cut at a word boundary
fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) => format!("{}...", cut[..idx].trim_end()),
        None => format!("{}...", cut),
    }
}
