//! Chat service. Message send, typing state, read receipts and sessions.
//!
//! DESIGN
//! ======
//! Every real-time operation is "persist, then publish". The store write
//! happens first; only a successfully persisted row is broadcast, so a
//! storage failure never leaks un-persisted data to the room.
//!
//! - `send_message` fans out `new_message` to the room *and* the origin,
//!   which needs the generated id/timestamp to reconcile its local copy.
//! - `set_typing` fans out `user_typing` to the room *except* the origin.
//! - `mark_read` is pull-only; nothing is broadcast.
//!
//! ERROR HANDLING
//! ==============
//! Touching the parent session's `updated_at` after a send is best-effort:
//! a missing session is logged as `SessionNotFound` and the created message
//! is still returned. Every store call is bounded by the configured timeout.
//! Message ids are minted before the insert; when the insert times out the
//! id is looked up once, and a row that landed anyway is published as usual.
//!
//! Two concurrent sends for the same session are ordered by the database,
//! not by an explicit lock here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ChatError, ErrorCode};
use crate::event::{SendMessagePayload, ServerEvent, TypingPayload, UserTyping};
use crate::models::{ChatSession, Message, NewMessage, NewSession, SenderType, SessionSummary, TypingIndicator};
use crate::services::registry::{Audience, ConnectionId, SessionRegistry};
use crate::store::{self, ChatStore, StoreError};

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    registry: SessionRegistry,
    timeout: Duration,
}

impl ChatService {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, registry: SessionRegistry, timeout: Duration) -> Self {
        Self { store, registry, timeout }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        store::bounded(self.timeout, fut).await
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Persist a message, touch its session, and publish `new_message`.
    ///
    /// `origin` is the sending websocket connection, if any; it receives the
    /// event even when it has not joined the room.
    ///
    /// # Errors
    ///
    /// `Validation` for empty content or an unknown sender type,
    /// `Persistence` if the insert fails, `UnconfirmedMessage` if it timed
    /// out and the row could not be found afterwards.
    pub async fn send_message(
        &self,
        origin: Option<ConnectionId>,
        payload: SendMessagePayload,
    ) -> Result<Message, ChatError> {
        let new = validate_message(payload)?;
        let session_id = new.session_id;
        let message_id = new.id;

        let message = match self.bounded(self.store.insert_message(new)).await {
            Ok(message) => message,
            Err(StoreError::Timeout(limit)) => self.confirm_insert(session_id, message_id, limit).await?,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.touch_session(session_id).await {
            warn!(%session_id, message_id = %message.id, code = e.error_code(), error = %e, "chat: session touch skipped");
        }

        let audience = origin.map_or(Audience::Room, Audience::RoomAndOrigin);
        let delivered = self
            .registry
            .broadcast(session_id, &ServerEvent::NewMessage(message.clone()), audience);
        info!(%session_id, message_id = %message.id, sender_type = %message.sender_type, delivered, "chat: message sent");

        Ok(message)
    }

    /// One lookup after a timed-out insert. A row that landed anyway is
    /// treated as sent so the room still hears about it.
    async fn confirm_insert(&self, session_id: Uuid, message_id: Uuid, limit: Duration) -> Result<Message, ChatError> {
        match self.bounded(self.store.find_message(message_id)).await {
            Ok(Some(message)) => {
                warn!(%session_id, %message_id, timeout_ms = limit.as_millis(), "chat: insert acknowledged late, row found");
                Ok(message)
            }
            Ok(None) => {
                warn!(%session_id, %message_id, timeout_ms = limit.as_millis(), "chat: insert timed out, row not found");
                Err(ChatError::UnconfirmedMessage(message_id))
            }
            Err(e) => {
                warn!(%session_id, %message_id, error = %e, "chat: insert timed out, lookup failed");
                Err(ChatError::UnconfirmedMessage(message_id))
            }
        }
    }

    async fn touch_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        match self.bounded(self.store.touch_session(session_id)).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(ChatError::SessionNotFound(session_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Messages of a session, oldest first.
    ///
    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, ChatError> {
        Ok(self.bounded(self.store.list_messages(session_id)).await?)
    }

    /// Flip `is_read` to true. Calling it again is not an error.
    ///
    /// # Errors
    ///
    /// `NotFound` if the message does not exist.
    pub async fn mark_read(&self, message_id: Uuid) -> Result<Message, ChatError> {
        self.bounded(self.store.mark_message_read(message_id))
            .await
            .map_err(|e| ChatError::from_store("message", message_id, e))
    }

    // =========================================================================
    // TYPING
    // =========================================================================

    /// Upsert the `(session, user_type)` typing row and publish `user_typing`
    /// to every other room member.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown user type, `Persistence` if the upsert
    /// fails. Nothing is published on error.
    pub async fn set_typing(
        &self,
        origin: Option<ConnectionId>,
        payload: TypingPayload,
    ) -> Result<TypingIndicator, ChatError> {
        let user_type = parse_sender_type(&payload.user_type, "userType")?;
        let row = self
            .bounded(
                self.store
                    .upsert_typing(payload.session_id, user_type, payload.is_typing),
            )
            .await?;

        let event = ServerEvent::UserTyping(UserTyping {
            session_id: payload.session_id,
            user_type,
            is_typing: payload.is_typing,
        });
        let audience = origin.map_or(Audience::Room, Audience::RoomExcept);
        self.registry.broadcast(payload.session_id, &event, audience);

        Ok(row)
    }

    /// Current typing rows of a session.
    ///
    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub async fn typing_state(&self, session_id: Uuid) -> Result<Vec<TypingIndicator>, ChatError> {
        Ok(self.bounded(self.store.list_typing(session_id)).await?)
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Start a new chat session with status `active`.
    ///
    /// # Errors
    ///
    /// `Validation` if `user_id` is blank.
    pub async fn create_session(&self, new: NewSession) -> Result<ChatSession, ChatError> {
        if new.user_id.trim().is_empty() {
            return Err(ChatError::validation("userId is required"));
        }
        let session = self.bounded(self.store.create_session(new)).await?;
        info!(session_id = %session.id, user_id = %session.user_id, "chat: session created");
        Ok(session)
    }

    /// All sessions, most recently active first.
    ///
    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        Ok(self.bounded(self.store.list_sessions()).await?)
    }

    /// # Errors
    ///
    /// `NotFound` if the session is absent.
    pub async fn get_session(&self, session_id: Uuid) -> Result<ChatSession, ChatError> {
        self.bounded(self.store.get_session(session_id))
            .await?
            .ok_or(ChatError::NotFound { entity: "chat session", id: session_id })
    }

    /// # Errors
    ///
    /// `Validation` if `status` is blank, `NotFound` if the session is absent.
    pub async fn update_status(&self, session_id: Uuid, status: &str) -> Result<ChatSession, ChatError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ChatError::validation("status is required"));
        }
        self.bounded(self.store.update_session_status(session_id, status))
            .await
            .map_err(|e| ChatError::from_store("chat session", session_id, e))
    }

    /// Delete a session; its messages and typing rows go with it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session is absent.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        self.bounded(self.store.delete_session(session_id))
            .await
            .map_err(|e| ChatError::from_store("chat session", session_id, e))?;
        info!(%session_id, "chat: session deleted");
        Ok(())
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn parse_sender_type(raw: &str, field: &str) -> Result<SenderType, ChatError> {
    SenderType::parse(raw).ok_or_else(|| ChatError::validation(format!("{field} must be 'user' or 'admin'")))
}

fn validate_message(payload: SendMessagePayload) -> Result<NewMessage, ChatError> {
    let sender_type = parse_sender_type(&payload.sender_type, "senderType")?;
    if payload.content.is_empty() {
        return Err(ChatError::validation("content must not be empty"));
    }
    Ok(NewMessage {
        id: Uuid::now_v7(),
        session_id: payload.session_id,
        sender_type,
        sender_id: payload.sender_id.filter(|id| !id.is_empty()),
        content: payload.content,
    })
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
