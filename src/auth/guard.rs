use chrono::Duration;
use tracing::{debug, instrument, warn};

use crate::error::AuthError;

use super::context::{Identity, RequestContext};
use super::session::SessionStore;
use super::validator::SessionValidator;

/// Where rejected navigations are sent.
pub const PUBLIC_ENTRY: &str = "/map";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed(Identity),
    Redirect(&'static str),
}

/// States a single navigation attempt passes through.
///
/// `Unchecked -> NoToken -> Redirected`
/// `Unchecked -> Validating -> Allowed | Redirected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unchecked,
    NoToken,
    Validating,
    Allowed,
    Redirected,
}

impl GuardState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GuardState::Allowed | GuardState::Redirected)
    }
}

/// Gate run before any protected view.
///
/// The guard only reads: it never creates, extends or deletes sessions.
/// Store failures come back as `Err` rather than a redirect so an outage is
/// not mistaken for a logged-out user.
pub struct RouteGuard<'a, S: SessionStore + ?Sized> {
    validator: SessionValidator<'a, S>,
    public_entry: &'static str,
}

impl<'a, S: SessionStore + ?Sized> RouteGuard<'a, S> {
    pub fn new(store: &'a S, session_lifetime: Duration) -> Self {
        Self {
            validator: SessionValidator::new(store, session_lifetime),
            public_entry: PUBLIC_ENTRY,
        }
    }

    #[instrument(skip_all, fields(state = tracing::field::Empty))]
    pub async fn check(&self, ctx: &RequestContext) -> Result<GuardOutcome, AuthError> {
        let mut state = GuardState::Unchecked;

        let token = match ctx.session_token() {
            Some(token) => {
                state = self.transition(state, GuardState::Validating);
                token
            }
            None => {
                state = self.transition(state, GuardState::NoToken);
                self.transition(state, GuardState::Redirected);
                return Ok(GuardOutcome::Redirect(self.public_entry));
            }
        };

        match self.validator.validate(token).await {
            Ok(validated) => {
                self.transition(state, GuardState::Allowed);
                Ok(GuardOutcome::Allowed(Identity {
                    user_id: validated.user_id,
                    session_id: validated.session_id,
                }))
            }
            Err(err) if err.is_rejection() => {
                warn!(reason = %err, "Session rejected");
                self.transition(state, GuardState::Redirected);
                Ok(GuardOutcome::Redirect(self.public_entry))
            }
            Err(err) => Err(err),
        }
    }

    fn transition(&self, from: GuardState, to: GuardState) -> GuardState {
        debug_assert!(!from.is_terminal(), "guard left a terminal state");
        debug!(from = ?from, to = ?to, "Route guard transition");
        tracing::Span::current().record("state", tracing::field::debug(to));
        to
    }
}
