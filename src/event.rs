//! Real-time wire format.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text frame carries one JSON event of the shape
//! `{"event": "<name>", "data": <payload>}`. Clients send `ClientEvent`s;
//! the server pushes `ServerEvent`s, either fanned out to a session room or
//! addressed to a single connection.
//!
//! | Direction | Event           | Payload                                        |
//! |-----------|-----------------|------------------------------------------------|
//! | in        | `join_session`  | session id                                     |
//! | in        | `leave_session` | session id                                     |
//! | in        | `send_message`  | `{sessionId, senderType, senderId?, content}`  |
//! | in        | `typing`        | `{sessionId, userType, isTyping}`              |
//! | out       | `connected`     | `{connectionId}`                               |
//! | out       | `new_message`   | persisted `Message`                            |
//! | out       | `user_typing`   | `{sessionId, userType, isTyping}`              |
//! | out       | `error`         | `{message, code, retryable}`                   |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{Message, SenderType};

// =============================================================================
// INBOUND
// =============================================================================

/// `send_message` payload. Field values are validated by the chat service,
/// not by the decoder, so a bad `senderType` becomes a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub session_id: Uuid,
    pub sender_type: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// `typing` payload as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub session_id: Uuid,
    pub user_type: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinSession(Uuid),
    LeaveSession(Uuid),
    SendMessage(SendMessagePayload),
    Typing(TypingPayload),
}

impl ClientEvent {
    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the frame is not a known event.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Event name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSession(_) => "join_session",
            Self::LeaveSession(_) => "leave_session",
            Self::SendMessage(_) => "send_message",
            Self::Typing(_) => "typing",
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Typing state as republished to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub session_id: Uuid,
    pub user_type: SenderType,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: Uuid,
    },
    NewMessage(Message),
    UserTyping(UserTyping),
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Structured error from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error(ErrorPayload {
            message: err.to_string(),
            code: err.error_code().to_owned(),
            retryable: err.retryable(),
        })
    }

    /// Event name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::NewMessage(_) => "new_message",
            Self::UserTyping(_) => "user_typing",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
