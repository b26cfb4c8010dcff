//! Persistence access.
//!
//! ARCHITECTURE
//! ============
//! `ChatStore` is the one seam between the domain services and storage.
//! Startup builds a concrete store and hands it to every service that needs
//! it, so nothing reaches for a global model registry. Postgres is the only
//! production implementation; tests swap in an in-memory double.
//!
//! Every call made by a service is wrapped in [`bounded`] so a stalled
//! database surfaces as `StoreError::Timeout` instead of hanging a
//! connection task.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::models::{
    Admin, ChatSession, Message, NewAdmin, NewMessage, NewSession, SenderType, SessionSummary, TypingIndicator,
};

pub use postgres::PgStore;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Target row does not exist.
    #[error("row not found")]
    NotFound,
    /// Unique constraint violated.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// Foreign key constraint violated.
    #[error("foreign key constraint violated: {0}")]
    ForeignKey(String),
    #[error("storage call exceeded {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unknown").to_owned())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::ForeignKey(db.constraint().unwrap_or("unknown").to_owned())
            }
            other => Self::Database(other),
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    // --- admins ---

    async fn create_admin(&self, new: NewAdmin) -> Result<Admin, StoreError>;

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError>;

    async fn find_admin(&self, id: Uuid) -> Result<Option<Admin>, StoreError>;

    // --- sessions ---

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError>;

    /// All sessions, most recently updated first, each with its latest message.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError>;

    /// Returns `StoreError::NotFound` if the session does not exist.
    async fn update_session_status(&self, id: Uuid, status: &str) -> Result<ChatSession, StoreError>;

    /// Set `updated_at = now()` and nothing else.
    /// Returns `StoreError::NotFound` if the session does not exist.
    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete a session together with its messages and typing rows.
    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError>;

    // --- messages ---

    /// Insert under `new.id`. Inserting an id that already exists returns
    /// the stored row unchanged.
    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError>;

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Messages of one session in creation order.
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Unconditionally set `is_read = true` and return the row.
    async fn mark_message_read(&self, id: Uuid) -> Result<Message, StoreError>;

    // --- typing ---

    /// Atomic insert-or-update of the `(session_id, user_type)` row.
    async fn upsert_typing(
        &self,
        session_id: Uuid,
        user_type: SenderType,
        is_typing: bool,
    ) -> Result<TypingIndicator, StoreError>;

    async fn list_typing(&self, session_id: Uuid) -> Result<Vec<TypingIndicator>, StoreError>;
}

// =============================================================================
// TIMEOUT
// =============================================================================

/// Run one storage call with an upper bound on its duration.
///
/// # Errors
///
/// Returns `StoreError::Timeout` if `fut` does not finish within `limit`,
/// otherwise whatever `fut` returned.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
