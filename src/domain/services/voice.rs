//! Phone IVR: TwiML rendering and the call flow behind the Twilio webhooks

use serde::Deserialize;
use serde_json::json;

use super::chat::{ChatService, TurnRequest};
use crate::config::HotelInfo;
use crate::domain::models::{Channel, EventType, GuestContext, GuestType, MessageType};
use crate::infrastructure::database::{AnalyticsRepository, Database};
use crate::shared::logging;

pub const VOICE: &str = "alice";
pub const PROCESS_PATH: &str = "/voice/process";
pub const CONTINUE_PATH: &str = "/voice/continue";

const SPEECH_TIMEOUT_SECS: u32 = 5;
const DIGIT_TIMEOUT_SECS: u32 = 10;

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// What a `<Gather>` listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherInput {
    Speech,
    Dtmf,
}

impl GatherInput {
    fn as_str(&self) -> &'static str {
        match self {
            GatherInput::Speech => "speech",
            GatherInput::Dtmf => "dtmf",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Say(String),
    Gather {
        input: GatherInput,
        action: String,
        timeout: u32,
        num_digits: Option<u32>,
        prompt: Option<String>,
    },
    Dial(String),
    Hangup,
}

/// Builder for a TwiML `<Response>` document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// Listen for speech, speaking `prompt` while waiting
    pub fn gather_speech(mut self, action: &str, prompt: Option<&str>) -> Self {
        self.verbs.push(Verb::Gather {
            input: GatherInput::Speech,
            action: action.to_string(),
            timeout: SPEECH_TIMEOUT_SECS,
            num_digits: None,
            prompt: prompt.map(str::to_string),
        });
        self
    }

    /// Wait for a single key press
    pub fn gather_digit(mut self, action: &str, prompt: Option<&str>) -> Self {
        self.verbs.push(Verb::Gather {
            input: GatherInput::Dtmf,
            action: action.to_string(),
            timeout: DIGIT_TIMEOUT_SECS,
            num_digits: Some(1),
            prompt: prompt.map(str::to_string),
        });
        self
    }

    pub fn dial(mut self, number: impl Into<String>) -> Self {
        self.verbs.push(Verb::Dial(number.into()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => xml.push_str(&say_xml(text)),
                Verb::Gather {
                    input,
                    action,
                    timeout,
                    num_digits,
                    prompt,
                } => {
                    xml.push_str(&format!(
                        r#"<Gather input="{}" action="{}" method="POST" timeout="{}""#,
                        input.as_str(),
                        escape_xml(action),
                        timeout
                    ));
                    if let Some(n) = num_digits {
                        xml.push_str(&format!(r#" numDigits="{}""#, n));
                    }
                    if *input == GatherInput::Speech {
                        xml.push_str(r#" speechTimeout="auto""#);
                    }
                    match prompt {
                        Some(text) => {
                            xml.push('>');
                            xml.push_str(&say_xml(text));
                            xml.push_str("</Gather>");
                        }
                        None => xml.push_str("/>"),
                    }
                }
                Verb::Dial(number) => {
                    xml.push_str(&format!("<Dial>{}</Dial>", escape_xml(number)));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

fn say_xml(text: &str) -> String {
    format!(r#"<Say voice="{}">{}</Say>"#, VOICE, escape_xml(text))
}

/// Form fields Twilio posts to the voice webhooks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallParams {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "Digits", default)]
    pub digits: Option<String>,
}

/// Drives the IVR call flow
#[derive(Clone)]
pub struct VoiceService {
    db: Database,
    chat: ChatService,
    hotel: HotelInfo,
}

impl VoiceService {
    pub fn new(db: Database, chat: ChatService, hotel: HotelInfo) -> Self {
        Self { db, chat, hotel }
    }

    fn goodbye(&self) -> String {
        format!("Thank you for calling {}. Have a great day!", self.hotel.name)
    }

    /// Incoming call: greet and listen
    pub async fn webhook(&self, params: &CallParams) -> VoiceResponse {
        let call_sid = params.call_sid.as_deref().unwrap_or("unknown");
        logging::log_voice_step("webhook", call_sid);

        if let Err(e) = AnalyticsRepository::record(
            &self.db,
            EventType::VoiceCall,
            Some(Channel::Voice.as_str()),
            1.0,
            json!({ "call_sid": call_sid }),
        )
        .await
        {
            tracing::warn!(call_sid = call_sid, error = %e, "Failed to record voice call");
        }

        let welcome = format!(
            "Welcome to {} customer service. I'm your AI assistant. How can I help you today?",
            self.hotel.name
        );
        VoiceResponse::new()
            .gather_speech(PROCESS_PATH, Some(&welcome))
            .say(self.goodbye())
    }

    /// Caller finished speaking: answer through the chat pipeline
    pub async fn process(&self, params: &CallParams) -> VoiceResponse {
        let call_sid = params.call_sid.clone();
        logging::log_voice_step("process", call_sid.as_deref().unwrap_or("unknown"));

        let speech = params
            .speech_result
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(speech) = speech else {
            return VoiceResponse::new()
                .say("I'm sorry, I didn't catch that.")
                .gather_speech(PROCESS_PATH, Some("Please tell me how I can help you."))
                .say(self.goodbye());
        };

        let guest = match params.from.as_deref() {
            Some(phone) => GuestContext::with_phone(phone),
            None => GuestContext {
                guest_type: Some(GuestType::Caller),
                ..Default::default()
            },
        };
        let request = TurnRequest {
            message: speech.to_string(),
            session_id: call_sid.clone(),
            channel: Channel::Voice,
            guest,
            message_type: MessageType::Audio,
            metadata: json!({ "call_sid": call_sid }),
        };

        match self.chat.handle_turn(request).await {
            Ok(outcome) if outcome.escalate => VoiceResponse::new()
                .say(outcome.response)
                .say(
                    "I'm transferring you to a member of our staff who can better assist you. \
                     Please hold while I connect you.",
                )
                .dial(self.hotel.phone.clone()),
            Ok(outcome) => VoiceResponse::new()
                .say(outcome.response)
                .gather_digit(
                    CONTINUE_PATH,
                    Some("Is there anything else I can help you with? Press 1 for yes, or hang up if you're satisfied."),
                )
                .say(self.goodbye()),
            Err(e) => {
                tracing::error!(error = %e, "Voice turn failed");
                VoiceResponse::new()
                    .say(
                        "I apologize, but I'm experiencing technical difficulties. \
                         Please call our front desk directly for immediate assistance.",
                    )
                    .hangup()
            }
        }
    }

    /// Key press after an answer: `1` asks another question
    pub fn continue_call(&self, params: &CallParams) -> VoiceResponse {
        logging::log_voice_step("continue", params.call_sid.as_deref().unwrap_or("unknown"));

        if params.digits.as_deref().map(str::trim) == Some("1") {
            VoiceResponse::new()
                .gather_speech(PROCESS_PATH, Some("Please go ahead with your next question."))
                .say(self.goodbye())
        } else {
            VoiceResponse::new().say(self.goodbye()).hangup()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::assistant::RuleBasedAssistant;
    use crate::domain::services::chat::tests::service_with;
    use crate::infrastructure::database::connection::test_database;
    use crate::realtime::RealtimeHub;
    use std::sync::Arc;

    async fn voice() -> VoiceService {
        let db = test_database().await;
        let chat = service_with(
            db.clone(),
            RealtimeHub::new(),
            Arc::new(RuleBasedAssistant::new(HotelInfo::default())),
        )
        .await;
        VoiceService::new(db, chat, HotelInfo::default())
    }

    fn call(speech: Option<&str>, digits: Option<&str>) -> CallParams {
        CallParams {
            call_sid: Some("CA123".to_string()),
            from: Some("+15550001111".to_string()),
            speech_result: speech.map(str::to_string),
            digits: digits.map(str::to_string),
        }
    }

    #[test]
    fn test_twiml_rendering_and_escaping() {
        let xml = VoiceResponse::new()
            .say("Fish & <chips>")
            .gather_digit("/voice/continue", None)
            .dial("+1234567890")
            .hangup()
            .to_xml();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#));
        assert!(xml.contains(r#"<Say voice="alice">Fish &amp; &lt;chips&gt;</Say>"#));
        assert!(xml.contains(
            r#"<Gather input="dtmf" action="/voice/continue" method="POST" timeout="10" numDigits="1"/>"#
        ));
        assert!(xml.contains("<Dial>+1234567890</Dial><Hangup/></Response>"));
    }

    #[test]
    fn test_speech_gather_wraps_prompt() {
        let xml = VoiceResponse::new()
            .gather_speech(PROCESS_PATH, Some("Go ahead"))
            .to_xml();
        assert!(xml.contains(r#"<Gather input="speech" action="/voice/process" method="POST" timeout="5" speechTimeout="auto"><Say voice="alice">Go ahead</Say></Gather>"#));
    }

    #[tokio::test]
    async fn test_webhook_greets_and_listens() {
        let xml = voice().await.webhook(&call(None, None)).await.to_xml();
        assert!(xml.contains("Welcome to Grand Hotel"));
        assert!(xml.contains(r#"input="speech""#));
    }

    #[tokio::test]
    async fn test_process_without_speech_reprompts() {
        let xml = voice().await.process(&call(Some("  "), None)).await.to_xml();
        assert!(xml.contains("didn't catch that"));
        assert!(xml.contains(PROCESS_PATH));
    }

    #[tokio::test]
    async fn test_process_answers_and_offers_more_help() {
        let xml = voice().await.process(&call(Some("Is there parking?"), None)).await.to_xml();
        assert!(xml.contains("Press 1 for yes"));
        assert!(xml.contains(CONTINUE_PATH));
        assert!(!xml.contains("<Dial>"));
    }

    #[tokio::test]
    async fn test_process_escalation_dials_hotel() {
        let xml = voice()
            .await
            .process(&call(Some("I need to talk to a manager"), None))
            .await
            .to_xml();
        assert!(xml.contains("<Dial>+1234567890</Dial>"));
    }

    #[tokio::test]
    async fn test_continue() {
        let service = voice().await;
        assert!(service.continue_call(&call(None, Some("1"))).to_xml().contains(PROCESS_PATH));
        let bye = service.continue_call(&call(None, Some("2"))).to_xml();
        assert!(bye.contains("Have a great day"));
        assert!(bye.ends_with("<Hangup/></Response>"));
    }
}
