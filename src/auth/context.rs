use std::convert::Infallible;
use std::fmt;

use rocket::Request;
use rocket::http::CookieJar;
use rocket::request::{FromRequest, Outcome};

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub session_id: String,
}

/// Per-request auth state, passed explicitly to whatever needs the caller.
///
/// Starts out holding only the presented token; the route guard fills in the
/// identity once the token has been validated.
#[derive(Clone, Default)]
pub struct RequestContext {
    session_token: Option<String>,
    identity: Option<Identity>,
}

impl RequestContext {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
            identity: None,
        }
    }

    pub fn from_cookies(cookies: &CookieJar<'_>) -> Self {
        Self {
            session_token: cookies
                .get_private(SESSION_COOKIE)
                .map(|c| c.value().to_string()),
            identity: None,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn resolved(self, identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..self
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("has_token", &self.session_token.is_some())
            .field("identity", &self.identity)
            .finish()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestContext {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RequestContext::from_cookies(request.cookies()))
    }
}
