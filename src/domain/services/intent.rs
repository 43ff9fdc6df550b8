//! Keyword-based intent and sentiment analysis
//!
//! Deterministic; used by the rule-based assistant and to fill in whatever a
//! language model leaves out.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::{Intent, Sentiment};

/// Confidence reported when nothing matched
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Whole-word alternation of escaped literals
fn word_set(words: &[&str]) -> Option<Regex> {
    let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()
}

fn hits(pattern: &Option<Regex>, text: &str) -> usize {
    pattern.as_ref().map_or(0, |p| p.find_iter(text).count())
}

/// Intents in tie-break order; greeting is handled separately
static INTENT_KEYWORDS: Lazy<Vec<(Intent, Option<Regex>)>> = Lazy::new(|| {
    vec![
        (Intent::Complaint, word_set(&[
            "complain", "complaint", "terrible", "awful", "unacceptable", "disappointed",
            "worst", "rude", "dirty", "disgusting", "horrible", "refund",
        ])),
        (Intent::Billing, word_set(&[
            "bill", "billing", "invoice", "charge", "charged", "payment", "pay", "receipt",
            "credit card", "deposit", "price", "cost",
        ])),
        (Intent::Maintenance, word_set(&[
            "broken", "repair", "fix", "not working", "leak", "leaking", "air conditioning",
            "ac", "heating", "heater", "toilet", "shower", "light", "tv", "wifi not",
        ])),
        (Intent::Housekeeping, word_set(&[
            "towel", "towels", "clean", "cleaning", "housekeeping", "sheets", "linen",
            "pillow", "pillows", "blanket", "toiletries", "shampoo", "soap", "tidy",
        ])),
        (Intent::RoomService, word_set(&[
            "room service", "order food", "deliver", "delivery", "bring me", "send up",
            "in-room dining", "to my room",
        ])),
        (Intent::Dining, word_set(&[
            "restaurant", "breakfast", "lunch", "dinner", "menu", "food", "eat", "bar",
            "drink", "drinks", "cafe", "dining",
        ])),
        (Intent::CheckInOut, word_set(&[
            "check in", "check-in", "checkin", "check out", "check-out", "checkout",
            "late checkout", "early check", "key card", "arrival", "departure",
        ])),
        (Intent::Booking, word_set(&[
            "book", "booking", "reserve", "reservation", "availability", "available",
            "vacancy", "cancel", "cancellation", "extend", "nights",
        ])),
        (Intent::Amenities, word_set(&[
            "pool", "gym", "fitness", "spa", "wifi", "wi-fi", "internet", "parking",
            "sauna", "amenities", "business center", "laundry", "shuttle",
        ])),
    ]
});

static GREETING: Lazy<Option<Regex>> = Lazy::new(|| {
    word_set(&["hello", "hi", "hey", "good morning", "good afternoon", "good evening", "greetings"])
});

static POSITIVE: Lazy<Option<Regex>> = Lazy::new(|| {
    word_set(&[
        "thank", "thanks", "great", "excellent", "wonderful", "amazing", "perfect", "love",
        "lovely", "good", "nice", "happy", "appreciate", "fantastic", "awesome", "pleased",
    ])
});

static NEGATIVE: Lazy<Option<Regex>> = Lazy::new(|| {
    word_set(&[
        "bad", "terrible", "awful", "horrible", "worst", "angry", "upset", "disappointed",
        "unacceptable", "disgusting", "rude", "dirty", "broken", "hate", "frustrated",
        "annoyed", "never", "poor", "complaint", "complain",
    ])
});

static HUMAN_REQUEST: Lazy<Option<Regex>> = Lazy::new(|| {
    word_set(&[
        "human", "real person", "manager", "supervisor", "agent", "representative",
        "receptionist", "staff member", "speak to someone", "talk to someone",
    ])
});

/// Classify the guest's message; returns the intent and a confidence in [0.5, 0.95]
pub fn classify(text: &str) -> (Intent, f64) {
    let text = text.to_lowercase();

    let mut best: Option<(Intent, usize)> = None;
    for (intent, pattern) in INTENT_KEYWORDS.iter() {
        let count = hits(pattern, &text);
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((*intent, count));
        }
    }

    match best {
        Some((intent, count)) => (intent, confidence_for(count)),
        None => {
            let count = hits(&GREETING, &text);
            if count > 0 {
                (Intent::Greeting, confidence_for(count))
            } else {
                (Intent::Inquiry, DEFAULT_CONFIDENCE)
            }
        }
    }
}

fn confidence_for(hits: usize) -> f64 {
    (0.6 + 0.1 * (hits.saturating_sub(1)) as f64).min(0.95)
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let text = text.to_lowercase();
    let positive = hits(&POSITIVE, &text);
    let negative = hits(&NEGATIVE, &text);

    if negative > positive {
        Sentiment::Negative
    } else if positive > negative {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

/// True for an explicit request for a person, or an upset complaint
pub fn should_escalate(text: &str, intent: Intent, sentiment: Sentiment) -> bool {
    if hits(&HUMAN_REQUEST, &text.to_lowercase()) > 0 {
        return true;
    }
    intent == Intent::Complaint && sentiment == Sentiment::Negative
}

/// Human-readable reason logged with an escalation
pub fn escalation_reason(text: &str) -> &'static str {
    if hits(&HUMAN_REQUEST, &text.to_lowercase()) > 0 {
        "guest asked for staff"
    } else {
        "negative complaint"
    }
}

/// Quick replies offered to the guest after a turn
pub fn suggested_responses(intent: Intent) -> Vec<String> {
    let replies: &[&str] = match intent {
        Intent::Greeting => &["I'd like to book a room", "What amenities do you have?", "Restaurant hours"],
        Intent::Booking => &["Check availability", "Room types and rates", "Cancellation policy"],
        Intent::CheckInOut => &["Check-in time", "Request late checkout", "Luggage storage"],
        Intent::RoomService => &["See the menu", "Order breakfast", "Delivery time"],
        Intent::Housekeeping => &["Extra towels", "Room cleaning", "More pillows"],
        Intent::Maintenance => &["Report another issue", "When will it be fixed?", "Change rooms"],
        Intent::Amenities => &["Pool hours", "Wi-Fi password", "Parking information"],
        Intent::Dining => &["Restaurant hours", "Make a reservation", "Room service menu"],
        Intent::Billing => &["View my bill", "Payment methods", "Request a receipt"],
        Intent::Complaint => &["Speak to a manager", "Request a room change", "Leave feedback"],
        Intent::Inquiry => &["Hotel amenities", "Contact the front desk", "Local attractions"],
    };
    replies.iter().map(|r| r.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_service_intents() {
        assert_eq!(classify("Can I get more towels and pillows?").0, Intent::Housekeeping);
        assert_eq!(classify("The air conditioning is broken").0, Intent::Maintenance);
        assert_eq!(classify("What time is breakfast served at the restaurant?").0, Intent::Dining);
        assert_eq!(classify("I want to book a room for 3 nights").0, Intent::Booking);
        assert_eq!(classify("When is check-out?").0, Intent::CheckInOut);
        assert_eq!(classify("Is there a pool or gym?").0, Intent::Amenities);
    }

    #[test]
    fn test_greeting_only_when_nothing_else_matches() {
        assert_eq!(classify("Hello there!").0, Intent::Greeting);
        assert_eq!(classify("Hi, I need clean towels").0, Intent::Housekeeping);
    }

    #[test]
    fn test_unknown_text_is_inquiry() {
        assert_eq!(classify("What is the meaning of this?"), (Intent::Inquiry, DEFAULT_CONFIDENCE));
        assert_eq!(classify(""), (Intent::Inquiry, DEFAULT_CONFIDENCE));
    }

    #[test]
    fn test_confidence_grows_with_hits() {
        let (_, one) = classify("towels");
        let (_, three) = classify("towels, sheets and a pillow");
        assert!(three > one);
        assert!(three <= 0.95);
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(analyze_sentiment("Thanks, the room is wonderful"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("This is terrible and the staff was rude"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("What time is it?"), Sentiment::Neutral);
    }

    #[test]
    fn test_escalation_rules() {
        assert!(should_escalate("Let me speak to a manager", Intent::Inquiry, Sentiment::Neutral));
        assert!(should_escalate("awful", Intent::Complaint, Sentiment::Negative));
        assert!(!should_escalate("awful", Intent::Complaint, Sentiment::Neutral));
        assert!(!should_escalate("more towels", Intent::Housekeeping, Sentiment::Neutral));
        assert_eq!(escalation_reason("get me a human"), "guest asked for staff");
    }

    #[test]
    fn test_suggested_responses_for_every_intent() {
        for intent in Intent::ALL {
            assert_eq!(suggested_responses(*intent).len(), 3);
        }
    }
}
