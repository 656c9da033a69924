use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::context::RequestContext;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<String>,
    pub nickname: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            nickname: user.nickname.unwrap_or_default(),
            created_at: user
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

/// A caller that made it through the route guard.
///
/// The context carries the resolved identity so handlers can hand it on
/// (for instance to log out the current session) without re-reading cookies.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub context: RequestContext,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.context.identity().map(|i| i.session_id.as_str())
    }
}
