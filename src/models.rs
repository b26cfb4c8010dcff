//! Persistent record types.
//!
//! DESIGN
//! ======
//! Four tables back the whole system: `admins`, `chat_sessions`, `messages`
//! and `typing_indicators`. A chat session owns its messages and typing
//! rows (cascade delete). Admins are independent and only loosely referenced
//! through `Message::sender_id`.
//!
//! All records serialize with camelCase keys so the JSON shape matches what
//! browser clients already consume.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// SENDER TYPE
// =============================================================================

/// Which side of the conversation produced a message or typing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Admin,
}

impl SenderType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ADMIN
// =============================================================================

/// Admin identity. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Public view of an admin returned by auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        Self { id: admin.id, email: admin.email.clone(), full_name: admin.full_name.clone() }
    }
}

/// Insert payload for a new admin. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

// =============================================================================
// CHAT SESSION
// =============================================================================

/// Status given to freshly created sessions.
pub const SESSION_STATUS_ACTIVE: &str = "active";

/// A conversation between one end user and the admin desk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Touched on every new message; drives recency ordering.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Session row plus its most recent message, for the admin session list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: ChatSession,
    pub last_message: Option<Message>,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A single chat line. Content is immutable; only `is_read` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub content: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated insert payload for a message. The id is minted by the caller
/// so a timed-out insert can be looked up afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub content: String,
}

// =============================================================================
// TYPING INDICATOR
// =============================================================================

/// Current typing state for one side of a session. At most one row exists
/// per `(session_id, user_type)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_type: SenderType,
    pub is_typing: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
