use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AuthError;

use super::token::{SessionToken, generate_secret, generate_session_id, hash_secret};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub secret_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: chrono::Duration) -> bool {
        now - self.created_at >= lifetime
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSession {
    pub id: String,
    pub user_id: String,
    pub secret_hash: Vec<u8>,
    pub created_at: NaiveDateTime,
}

impl From<DbSession> for Session {
    fn from(db: DbSession) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            secret_hash: db.secret_hash,
            created_at: DateTime::<Utc>::from_naive_utc_and_offset(db.created_at, Utc),
        }
    }
}

/// A freshly created session together with its raw secret.
///
/// This is the only place the secret exists on the server; it is handed to
/// the client inside the token and then dropped.
#[derive(Clone)]
pub struct IssuedSession {
    pub session: Session,
    secret: String,
}

impl IssuedSession {
    /// Generates a fresh id and secret for `user_id`. Nothing is persisted.
    pub fn generate(user_id: &str) -> Self {
        let secret = generate_secret();

        Self {
            session: Session {
                id: generate_session_id(),
                user_id: user_id.to_string(),
                secret_hash: hash_secret(&secret),
                created_at: Utc::now(),
            },
            secret,
        }
    }

    pub fn token(&self) -> SessionToken {
        SessionToken::new(self.session.id.clone(), self.secret.clone())
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedSession")
            .field("session_id", &self.session.id)
            .field("user_id", &self.session.user_id)
            .finish_non_exhaustive()
    }
}

#[rocket::async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session for `user_id` and returns it with its raw secret.
    async fn create(&self, user_id: &str) -> Result<IssuedSession, AuthError>;

    /// Fails with `SessionNotFound` when no row has this id.
    async fn find(&self, id: &str) -> Result<Session, AuthError>;

    /// Deleting a missing id is not an error.
    async fn invalidate(&self, id: &str) -> Result<(), AuthError>;
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: Pool<Sqlite>,
}

impl SqliteSessionStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn invalidate_user_sessions(&self, user_id: &str) -> Result<u64, AuthError> {
        info!("Invalidating all sessions for user");

        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    pub async fn delete_sessions_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        info!("Cleaning expired sessions");

        let result = sqlx::query("DELETE FROM sessions WHERE created_at < ?")
            .bind(cutoff.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[rocket::async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self))]
    async fn create(&self, user_id: &str) -> Result<IssuedSession, AuthError> {
        info!("Creating user session");

        let issued = IssuedSession::generate(user_id);
        let session = &issued.session;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, secret_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.secret_hash)
        .bind(session.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(issued)
    }

    #[instrument(skip(self))]
    async fn find(&self, id: &str) -> Result<Session, AuthError> {
        let row = sqlx::query_as::<_, DbSession>(
            "SELECT id, user_id, secret_hash, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::from).ok_or(AuthError::SessionNotFound)
    }

    #[instrument(skip(self))]
    async fn invalidate(&self, id: &str) -> Result<(), AuthError> {
        info!("Invalidating session");

        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
