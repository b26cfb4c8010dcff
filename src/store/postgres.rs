//! Postgres-backed `ChatStore`.
//!
//! DESIGN
//! ======
//! Plain `sqlx::query` + `Row::try_get` mapping; no compile-time checked
//! macros so the crate builds without a live database. Row ids are UUIDv7
//! minted here (message ids by the caller), timestamps come from the
//! database clock.
//!
//! Integrity rules live in the schema (see `src/db/migrations`): FK with
//! `ON DELETE CASCADE` from messages/typing rows to sessions, `UNIQUE(email)`
//! on admins and `UNIQUE(session_id, user_type)` on typing indicators.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ChatStore, StoreError};
use crate::models::{
    Admin, ChatSession, Message, NewAdmin, NewMessage, NewSession, SESSION_STATUS_ACTIVE, SenderType, SessionSummary,
    TypingIndicator,
};

const ADMIN_COLUMNS: &str = "id, email, password_hash, full_name, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, user_name, user_email, status, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, session_id, sender_type, sender_id, content, is_read, created_at, updated_at";
const TYPING_COLUMNS: &str = "id, session_id, user_type, is_typing, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn sender_type_column(row: &PgRow, column: &str) -> Result<SenderType, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    SenderType::parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_owned(),
        source: format!("unknown sender type: {raw}").into(),
    })
}

fn admin_from_row(row: &PgRow) -> Result<Admin, sqlx::Error> {
    Ok(Admin {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<ChatSession, sqlx::Error> {
    Ok(ChatSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        user_email: row.try_get("user_email")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        sender_type: sender_type_column(row, "sender_type")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Decode the `m_`-prefixed latest-message columns of the session listing.
fn latest_message_from_row(row: &PgRow) -> Result<Option<Message>, sqlx::Error> {
    let Some(id) = row.try_get::<Option<Uuid>, _>("m_id")? else {
        return Ok(None);
    };
    Ok(Some(Message {
        id,
        session_id: row.try_get("id")?,
        sender_type: sender_type_column(row, "m_sender_type")?,
        sender_id: row.try_get("m_sender_id")?,
        content: row.try_get("m_content")?,
        is_read: row.try_get("m_is_read")?,
        created_at: row.try_get("m_created_at")?,
        updated_at: row.try_get("m_updated_at")?,
    }))
}

fn typing_from_row(row: &PgRow) -> Result<TypingIndicator, sqlx::Error> {
    Ok(TypingIndicator {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        user_type: sender_type_column(row, "user_type")?,
        is_typing: row.try_get("is_typing")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
impl ChatStore for PgStore {
    async fn create_admin(&self, new: NewAdmin) -> Result<Admin, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO admins (id, email, password_hash, full_name) VALUES ($1, $2, $3, $4) RETURNING {ADMIN_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(admin_from_row(&row)?)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(admin_from_row).transpose()?)
    }

    async fn find_admin(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(admin_from_row).transpose()?)
    }

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO chat_sessions (id, user_id, user_name, user_email, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&new.user_id)
        .bind(&new.user_name)
        .bind(&new.user_email)
        .bind(SESSION_STATUS_ACTIVE)
        .fetch_one(&self.pool)
        .await?;
        Ok(session_from_row(&row)?)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT s.id, s.user_id, s.user_name, s.user_email, s.status, s.created_at, s.updated_at,
                    m.id AS m_id, m.sender_type AS m_sender_type, m.sender_id AS m_sender_id,
                    m.content AS m_content, m.is_read AS m_is_read,
                    m.created_at AS m_created_at, m.updated_at AS m_updated_at
             FROM chat_sessions s
             LEFT JOIN LATERAL (
                 SELECT id, sender_type, sender_id, content, is_read, created_at, updated_at
                 FROM messages
                 WHERE session_id = s.id
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1
             ) m ON TRUE
             ORDER BY s.updated_at DESC, s.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(SessionSummary { session: session_from_row(row)?, last_message: latest_message_from_row(row)? });
        }
        Ok(out)
    }

    async fn update_session_status(&self, id: Uuid, status: &str) -> Result<ChatSession, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE chat_sessions SET status = $2, updated_at = now() WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(session_from_row(&row)?)
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE chat_sessions SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO messages (id, session_id, sender_type, sender_id, content, is_read) \
             VALUES ($1, $2, $3, $4, $5, FALSE) ON CONFLICT (id) DO NOTHING RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(new.id)
        .bind(new.session_id)
        .bind(new.sender_type.as_str())
        .bind(&new.sender_id)
        .bind(&new.content)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(message_from_row(&row)?),
            None => self.find_message(new.id).await?.ok_or(StoreError::NotFound),
        }
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(message_from_row).transpose()?)
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(message_from_row).collect::<Result<_, _>>()?)
    }

    async fn mark_message_read(&self, id: Uuid) -> Result<Message, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE messages SET is_read = TRUE, updated_at = now() WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(message_from_row(&row)?)
    }

    async fn upsert_typing(
        &self,
        session_id: Uuid,
        user_type: SenderType,
        is_typing: bool,
    ) -> Result<TypingIndicator, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO typing_indicators (id, session_id, user_type, is_typing) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (session_id, user_type) DO UPDATE SET is_typing = EXCLUDED.is_typing, updated_at = now() \
             RETURNING {TYPING_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(session_id)
        .bind(user_type.as_str())
        .bind(is_typing)
        .fetch_one(&self.pool)
        .await?;
        Ok(typing_from_row(&row)?)
    }

    async fn list_typing(&self, session_id: Uuid) -> Result<Vec<TypingIndicator>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TYPING_COLUMNS} FROM typing_indicators WHERE session_id = $1 ORDER BY user_type ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(typing_from_row).collect::<Result<_, _>>()?)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
