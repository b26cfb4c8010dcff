//! Domain error taxonomy shared by the HTTP and websocket layers.
//!
//! ERROR HANDLING
//! ==============
//! Services return `ChatError`. Routes translate it into a status code plus
//! JSON body; the websocket layer turns it into an `error` event for the
//! originating connection only. Neither layer ever broadcasts an error.

use std::time::Duration;

use uuid::Uuid;

use crate::store::StoreError;

/// Grepable error code and retryable flag for structured error payloads.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Malformed input. Caller's fault, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Parent session missing during a best-effort write. Logged, not fatal.
    #[error("chat session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("persistence timed out after {}ms", .0.as_millis())]
    PersistenceTimeout(Duration),

    /// A message insert timed out and the follow-up lookup did not find the
    /// row. It may still land, so resending could store it twice.
    #[error("message {0} was not confirmed before the storage timeout")]
    UnconfirmedMessage(Uuid),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ChatError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Map a store failure where a missing row means `entity` was not found.
    pub(crate) fn from_store(entity: &'static str, id: Uuid, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound { entity, id },
            other => Self::from(other),
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(limit) => Self::PersistenceTimeout(limit),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::SessionNotFound(_) => "E_SESSION_NOT_FOUND",
            Self::Persistence(_) | Self::PersistenceTimeout(_) | Self::UnconfirmedMessage(_) => "E_PERSISTENCE",
            Self::Auth(_) => "E_AUTH",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::PersistenceTimeout(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
