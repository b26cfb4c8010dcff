//! In-memory `ChatStore` used by unit tests.
//!
//! Emulates the Postgres integrity rules the services rely on (FK + cascade,
//! unique email, unique typing pair) and exposes knobs to inject write
//! failures, latency and late write acknowledgements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::{ChatStore, StoreError};
use crate::models::{
    Admin, ChatSession, Message, NewAdmin, NewMessage, NewSession, SESSION_STATUS_ACTIVE, SenderType, SessionSummary,
    TypingIndicator,
};

#[derive(Default)]
struct Tables {
    admins: Vec<Admin>,
    sessions: Vec<ChatSession>,
    messages: Vec<Message>,
    typing: Vec<TypingIndicator>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    orphan_messages: AtomicBool,
    latency: Mutex<Option<Duration>>,
    insert_ack_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mutating call fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Accept messages whose session row is missing (simulates a session
    /// deleted between the insert and the timestamp touch).
    pub fn set_orphan_messages(&self, allow: bool) {
        self.orphan_messages.store(allow, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Commit message inserts immediately but hold the reply for `delay`
    /// (simulates a database that acknowledges a write late).
    pub fn set_insert_ack_delay(&self, delay: Option<Duration>) {
        *self.insert_ack_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn message_count(&self) -> usize {
        self.tables().messages.len()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, write: bool) -> Result<(), StoreError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if write && self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

/// Strictly later than `prev`, even when the clock has not moved.
fn advance(prev: OffsetDateTime) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    if now > prev { now } else { prev + time::Duration::microseconds(1) }
}

#[async_trait::async_trait]
impl ChatStore for MemoryStore {
    async fn create_admin(&self, new: NewAdmin) -> Result<Admin, StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        if tables.admins.iter().any(|a| a.email == new.email) {
            return Err(StoreError::Conflict("admins_email_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let admin = Admin {
            id: Uuid::now_v7(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            created_at: now,
            updated_at: now,
        };
        tables.admins.push(admin.clone());
        Ok(admin)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        self.enter(false).await?;
        Ok(self.tables().admins.iter().find(|a| a.email == email).cloned())
    }

    async fn find_admin(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        self.enter(false).await?;
        Ok(self.tables().admins.iter().find(|a| a.id == id).cloned())
    }

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError> {
        self.enter(true).await?;
        let now = OffsetDateTime::now_utc();
        let session = ChatSession {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            user_name: new.user_name,
            user_email: new.user_email,
            status: SESSION_STATUS_ACTIVE.into(),
            created_at: now,
            updated_at: now,
        };
        self.tables().sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        self.enter(false).await?;
        Ok(self.tables().sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.enter(false).await?;
        let tables = self.tables();
        let mut out: Vec<SessionSummary> = tables
            .sessions
            .iter()
            .map(|session| SessionSummary {
                session: session.clone(),
                last_message: tables
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.session_id == session.id)
                    .cloned(),
            })
            .collect();
        out.sort_by(|a, b| b.session.updated_at.cmp(&a.session.updated_at));
        Ok(out)
    }

    async fn update_session_status(&self, id: Uuid, status: &str) -> Result<ChatSession, StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)?;
        session.status = status.to_owned();
        session.updated_at = advance(session.updated_at);
        Ok(session.clone())
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)?;
        session.updated_at = advance(session.updated_at);
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.id != id);
        if tables.sessions.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.messages.retain(|m| m.session_id != id);
        tables.typing.retain(|t| t.session_id != id);
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        self.enter(true).await?;
        let message = {
            let mut tables = self.tables();
            if let Some(existing) = tables.messages.iter().find(|m| m.id == new.id) {
                return Ok(existing.clone());
            }
            let has_parent = tables.sessions.iter().any(|s| s.id == new.session_id);
            if !has_parent && !self.orphan_messages.load(Ordering::SeqCst) {
                return Err(StoreError::ForeignKey("messages_session_id_fkey".into()));
            }
            let now = OffsetDateTime::now_utc();
            let message = Message {
                id: new.id,
                session_id: new.session_id,
                sender_type: new.sender_type,
                sender_id: new.sender_id,
                content: new.content,
                is_read: false,
                created_at: now,
                updated_at: now,
            };
            tables.messages.push(message.clone());
            message
        };

        let ack_delay = *self.insert_ack_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(message)
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        self.enter(false).await?;
        Ok(self.tables().messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.enter(false).await?;
        Ok(self
            .tables()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn mark_message_read(&self, id: Uuid) -> Result<Message, StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound)?;
        message.is_read = true;
        message.updated_at = advance(message.updated_at);
        Ok(message.clone())
    }

    async fn upsert_typing(
        &self,
        session_id: Uuid,
        user_type: SenderType,
        is_typing: bool,
    ) -> Result<TypingIndicator, StoreError> {
        self.enter(true).await?;
        let mut tables = self.tables();
        if !tables.sessions.iter().any(|s| s.id == session_id) {
            return Err(StoreError::ForeignKey("typing_indicators_session_id_fkey".into()));
        }
        if let Some(row) = tables
            .typing
            .iter_mut()
            .find(|t| t.session_id == session_id && t.user_type == user_type)
        {
            row.is_typing = is_typing;
            row.updated_at = advance(row.updated_at);
            return Ok(row.clone());
        }
        let now = OffsetDateTime::now_utc();
        let row = TypingIndicator { id: Uuid::now_v7(), session_id, user_type, is_typing, created_at: now, updated_at: now };
        tables.typing.push(row.clone());
        Ok(row)
    }

    async fn list_typing(&self, session_id: Uuid) -> Result<Vec<TypingIndicator>, StoreError> {
        self.enter(false).await?;
        Ok(self
            .tables()
            .typing
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }
}
