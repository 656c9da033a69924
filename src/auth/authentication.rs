use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::{Instrument, error, info, warn};

use crate::db::find_user;
use crate::env::AuthSettings;
use crate::error::AuthError;

use super::context::RequestContext;
use super::guard::{GuardOutcome, PUBLIC_ENTRY, RouteGuard};
use super::session::SqliteSessionStore;
use super::user::AuthenticatedUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<AuthenticatedUser, AuthError> {
    let context = RequestContext::from_cookies(request.cookies());

    let (Some(store), Some(settings), Some(db)) = (
        request.rocket().state::<SqliteSessionStore>(),
        request.rocket().state::<AuthSettings>(),
        request.rocket().state::<SqlitePool>(),
    ) else {
        error!("Session store, auth settings or database pool missing from managed state");
        return Outcome::Forward(Status::InternalServerError);
    };

    let identity = match RouteGuard::new(store, settings.session_lifetime)
        .check(&context)
        .await
    {
        Ok(GuardOutcome::Allowed(identity)) => identity,
        Ok(GuardOutcome::Redirect(_)) => return Outcome::Forward(Status::Unauthorized),
        Err(err) => {
            error!(error = %err, "Session store unavailable during authentication");
            return Outcome::Error((Status::ServiceUnavailable, err));
        }
    };

    match find_user(db, &identity.user_id).await {
        Ok(Some(user)) => {
            info!(nickname = %user.nickname, "User authenticated via session token");
            Outcome::Success(AuthenticatedUser {
                user,
                context: context.resolved(identity),
            })
        }
        Ok(None) => {
            warn!(user_id = %identity.user_id, "Session refers to a missing user");
            Outcome::Forward(Status::Unauthorized)
        }
        Err(err) => {
            error!(user_id = %identity.user_id, error = ?err, "Failed to fetch user for valid session");
            Outcome::Error((
                Status::ServiceUnavailable,
                AuthError::UserLookup(Box::new(err)),
            ))
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::Unauthorized,
        Json(json!({
            "error": "Unauthorized",
            "message": "Authentication required",
            "redirect_to": PUBLIC_ENTRY,
        })),
    )
}

#[catch(503)]
pub fn service_unavailable_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::ServiceUnavailable,
        Json(json!({
            "error": "Service Unavailable",
            "message": "Please try again shortly",
        })),
    )
}
