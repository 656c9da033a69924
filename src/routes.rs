use rocket::State;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use tracing::{error, warn};

use crate::api::{MapView, UserData, load_map_view};
use crate::auth::{GuardOutcome, PUBLIC_ENTRY, RequestContext, RouteGuard, SqliteSessionStore};
use crate::db::{find_user, get_monitoring_summary, list_research};
use crate::env::AuthSettings;
use crate::models::{MonitoringSummary, Research};

const RECENT_RESEARCH_LIMIT: usize = 5;

#[derive(Serialize, Deserialize)]
pub struct DashboardView {
    pub user: UserData,
    pub summary: MonitoringSummary,
    pub recent_research: Vec<Research>,
}

#[derive(Responder)]
pub enum ViewError {
    Redirect(Redirect),
    Unavailable(Status),
}

#[get("/")]
pub fn index() -> Redirect {
    Redirect::to(PUBLIC_ENTRY)
}

#[get("/map?<q>&<state>")]
pub async fn map(
    q: Option<String>,
    state: Option<String>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MapView>, Status> {
    Ok(Json(
        load_map_view(db, q.as_deref(), state.as_deref()).await?,
    ))
}

#[get("/monitoring")]
pub async fn monitoring(db: &State<Pool<Sqlite>>) -> Result<Json<MonitoringSummary>, Status> {
    Ok(Json(get_monitoring_summary(db).await?))
}

/// Protected entry point. Runs the route guard itself so a rejected session
/// becomes a redirect rather than a 401.
#[get("/dashboard")]
pub async fn dashboard(
    context: RequestContext,
    store: &State<SqliteSessionStore>,
    settings: &State<AuthSettings>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DashboardView>, ViewError> {
    let identity = match RouteGuard::new(store.inner(), settings.session_lifetime)
        .check(&context)
        .await
    {
        Ok(GuardOutcome::Allowed(identity)) => identity,
        Ok(GuardOutcome::Redirect(to)) => return Err(ViewError::Redirect(Redirect::to(to))),
        Err(err) => {
            error!(error = %err, "Session store unavailable for dashboard");
            return Err(ViewError::Unavailable(Status::ServiceUnavailable));
        }
    };

    let user = match find_user(db, &identity.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user_id = %identity.user_id, "Session refers to a missing user");
            return Err(ViewError::Redirect(Redirect::to(PUBLIC_ENTRY)));
        }
        Err(err) => {
            err.log_and_record("Loading the dashboard user");
            return Err(ViewError::Unavailable(Status::ServiceUnavailable));
        }
    };

    let summary = get_monitoring_summary(db)
        .await
        .map_err(|e| ViewError::Unavailable(e.into()))?;

    let mut recent_research = list_research(db)
        .await
        .map_err(|e| ViewError::Unavailable(e.into()))?;
    recent_research.truncate(RECENT_RESEARCH_LIMIT);

    Ok(Json(DashboardView {
        user: UserData::from(user),
        summary,
        recent_research,
    }))
}
