use chrono::{Duration, Utc};
use tracing::{debug, instrument};

use crate::error::AuthError;

use super::session::SessionStore;
use super::token::{SessionToken, constant_time_eq, hash_secret};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession {
    pub session_id: String,
    pub user_id: String,
}

/// Checks a presented token against the session store.
///
/// Validation never writes: an expired session is rejected here and left for
/// the cleanup task to delete.
pub struct SessionValidator<'a, S: SessionStore + ?Sized> {
    store: &'a S,
    lifetime: Duration,
}

impl<'a, S: SessionStore + ?Sized> SessionValidator<'a, S> {
    pub fn new(store: &'a S, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    #[instrument(skip_all)]
    pub async fn validate(&self, raw_token: &str) -> Result<ValidatedSession, AuthError> {
        // Malformed input never reaches the store.
        let token = SessionToken::parse(raw_token)?;

        let session = self.store.find(&token.session_id).await?;

        let presented_hash = hash_secret(&token.secret);
        if !constant_time_eq(&presented_hash, &session.secret_hash) {
            return Err(AuthError::SecretMismatch);
        }

        if session.is_expired(Utc::now(), self.lifetime) {
            debug!(session_id = %session.id, "Session older than its lifetime");
            return Err(AuthError::SessionExpired);
        }

        Ok(ValidatedSession {
            session_id: session.id,
            user_id: session.user_id,
        })
    }
}
