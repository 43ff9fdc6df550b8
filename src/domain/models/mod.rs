// Domain models (business entities)
// Pure Rust, no framework dependencies

/// Defines a closed string vocabulary stored as snake_case text.
macro_rules! str_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod guest;
pub mod conversation;
pub mod message;
pub mod document;
pub mod guest_request;
pub mod analytics;

pub use guest::{Guest, GuestContext, GuestType};
pub use conversation::{Channel, Conversation, ConversationDetail, ConversationStatus, Priority};
pub use message::{Intent, Message, MessageType, SenderType, Sentiment};
pub use document::{Document, DocumentChunk, DocumentStatus, SearchHit, ALLOWED_EXTENSIONS};
pub use guest_request::{GuestRequest, RequestPriority, RequestStatus};
pub use analytics::{
    AdminStats, AnalyticsEvent, ChartData, ChartDataset, ConversationCharts, DashboardAnalytics,
    EventType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_str_enum_round_trip_through_text() {
        for status in ConversationStatus::ALL {
            assert_eq!(ConversationStatus::from_str(status.as_str()), Ok(*status));
        }
        assert_eq!(Channel::from_str(" Voice "), Ok(Channel::Voice));
        assert!(Priority::from_str("critical").is_err());
    }

    #[test]
    fn test_str_enum_serde_matches_as_str() {
        let json = serde_json::to_string(&Intent::RoomService).unwrap();
        assert_eq!(json, "\"room_service\"");
        let parsed: SenderType = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(parsed, SenderType::Agent);
    }
}
