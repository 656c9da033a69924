use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::db::{get_monitoring_summary, list_projects, search_active_municipalities};
use crate::error::AppError;
use crate::models::{MonitoringSummary, Municipality, Project};

#[derive(Serialize, Deserialize)]
pub struct MapView {
    pub municipalities: Vec<Municipality>,
    pub projects: Vec<Project>,
}

pub async fn load_map_view(
    db: &Pool<Sqlite>,
    query: Option<&str>,
    state: Option<&str>,
) -> Result<MapView, AppError> {
    let municipalities = search_active_municipalities(db, query, state).await?;
    let projects = list_projects(db, None).await?;

    Ok(MapView {
        municipalities,
        projects,
    })
}

#[get("/public/map?<q>&<state>")]
pub async fn api_public_map(
    q: Option<String>,
    state: Option<String>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MapView>, AppError> {
    Ok(Json(
        load_map_view(db, q.as_deref(), state.as_deref()).await?,
    ))
}

#[get("/public/monitoring")]
pub async fn api_public_monitoring(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MonitoringSummary>, AppError> {
    Ok(Json(get_monitoring_summary(db).await?))
}
