//! Admin accounts and bearer tokens.
//!
//! ARCHITECTURE
//! ============
//! Passwords are stored as Argon2id PHC strings. Login issues a stateless
//! HS256 JWT carrying the admin id; protected routes decode it and then
//! re-read the admin row, so a deleted admin's tokens stop working even
//! before they expire.
//!
//! Unknown email and wrong password produce the same `invalid credentials`
//! error.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{Admin, AdminProfile, NewAdmin};
use crate::store::{self, ChatStore, StoreError};

pub const MIN_PASSWORD_LENGTH: usize = 6;

const INVALID_CREDENTIALS: &str = "invalid credentials";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub admin: AdminProfile,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Admin id.
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn ChatStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
    timeout: Duration,
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, secret: &str, token_ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
            timeout,
        }
    }

    // =========================================================================
    // REGISTER / LOGIN
    // =========================================================================

    /// Create an admin and return a token for it.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, short password, or an email that
    /// is already registered. `Persistence` if storage fails.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ChatError> {
        let email = req.email.trim().to_owned();
        validate_email(&email)?;
        if req.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ChatError::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if store::bounded(self.timeout, self.store.find_admin_by_email(&email))
            .await?
            .is_some()
        {
            return Err(ChatError::validation("admin already exists"));
        }

        let new = NewAdmin {
            email,
            password_hash: hash_password_off_thread(req.password).await?,
            full_name: req.full_name.filter(|n| !n.trim().is_empty()),
        };
        let admin = match store::bounded(self.timeout, self.store.create_admin(new)).await {
            Ok(admin) => admin,
            // Lost a race with a concurrent registration for the same email.
            Err(StoreError::Conflict(_)) => return Err(ChatError::validation("admin already exists")),
            Err(e) => return Err(e.into()),
        };

        info!(admin_id = %admin.id, "auth: admin registered");
        self.respond(&admin)
    }

    /// # Errors
    ///
    /// `Auth` if the email is unknown or the password does not match.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ChatError> {
        let email = req.email.trim();
        validate_email(email)?;
        if req.password.is_empty() {
            return Err(ChatError::validation("password is required"));
        }

        let admin = store::bounded(self.timeout, self.store.find_admin_by_email(email))
            .await?
            .ok_or_else(|| ChatError::auth(INVALID_CREDENTIALS))?;

        if !verify_password_off_thread(req.password, admin.password_hash.clone()).await {
            return Err(ChatError::auth(INVALID_CREDENTIALS));
        }

        info!(admin_id = %admin.id, "auth: admin logged in");
        self.respond(&admin)
    }

    /// Resolve a bearer token to the admin it was issued for.
    ///
    /// # Errors
    ///
    /// `Auth` if the token is invalid, expired, or its admin no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<AdminProfile, ChatError> {
        let claims = self.verify_token(token)?;
        let admin = store::bounded(self.timeout, self.store.find_admin(claims.sub))
            .await?
            .ok_or_else(|| ChatError::auth("unknown admin"))?;
        Ok(AdminProfile::from(&admin))
    }

    fn respond(&self, admin: &Admin) -> Result<AuthResponse, ChatError> {
        Ok(AuthResponse { token: self.issue_token(admin)?, admin: AdminProfile::from(admin) })
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// Sign a token for `admin` valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// `Auth` if signing fails.
    pub fn issue_token(&self, admin: &Admin) -> Result<String, ChatError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims { sub: admin.id, email: admin.email.clone(), iat: now, exp: now.saturating_add(ttl) };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ChatError::auth(format!("token signing failed: {e}")))
    }

    /// Check signature and expiry.
    ///
    /// # Errors
    ///
    /// `Auth` if the token is malformed, forged, or expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ChatError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ChatError::auth(format!("invalid token: {e}")))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn validate_email(email: &str) -> Result<(), ChatError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }) && !email.chars().any(char::is_whitespace);

    if valid { Ok(()) } else { Err(ChatError::validation("a valid email is required")) }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, ChatError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ChatError::auth(format!("password hashing failed: {e}")))
}

/// Runs on the blocking pool; an Argon2 hash takes tens of milliseconds.
async fn hash_password_off_thread(password: String) -> Result<String, ChatError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ChatError::auth(format!("password hashing task failed: {e}")))?
}

async fn verify_password_off_thread(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

/// Verify a password against a stored PHC hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
