use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

str_enum! {
    /// Kind of person on the other end of a conversation
    GuestType {
        Guest => "guest",
        Caller => "caller",
        Vip => "vip",
        Staff => "staff",
    }
}

impl Default for GuestType {
    fn default() -> Self {
        GuestType::Guest
    }
}

/// Guest profile (stored in the `guest` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub session_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub room_number: Option<String>,
    pub guest_type: GuestType,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Optional details a client can send along with a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuestContext {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub guest_type: Option<GuestType>,
    #[serde(default)]
    pub language: Option<String>,
}

impl GuestContext {
    pub fn with_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            guest_type: Some(GuestType::Caller),
            ..Default::default()
        }
    }

    /// Merge what the guest record already knows with what the client sent
    pub fn merged_with(&self, guest: &Guest) -> GuestContext {
        GuestContext {
            name: self.name.clone().or_else(|| guest.name.clone()),
            email: self.email.clone().or_else(|| guest.email.clone()),
            phone: self.phone.clone().or_else(|| guest.phone.clone()),
            room_number: self.room_number.clone().or_else(|| guest.room_number.clone()),
            guest_type: self.guest_type.or(Some(guest.guest_type)),
            language: self.language.clone().or_else(|| Some(guest.language.clone())),
        }
    }
}
