#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod routes;
mod telemetry;
mod validation;

#[cfg(test)]
mod test;

use api::{
    api_add_project_expense, api_add_survey_question, api_archive_municipality,
    api_create_municipality, api_create_project, api_create_project_category,
    api_create_research, api_create_survey, api_get_all_users, api_get_municipalities,
    api_get_municipality, api_get_project, api_get_project_categories, api_get_projects,
    api_get_research, api_get_research_list, api_get_survey, api_get_survey_answers, api_login,
    api_logout, api_logout_all, api_me, api_me_unauthorized, api_public_map,
    api_public_monitoring, api_register_user, api_restore_municipality,
    api_submit_survey_answers, api_update_municipality, health,
};
use auth::{SqliteSessionStore, service_unavailable_api, unauthorized_api};
use chrono::Utc;
use db::ensure_bootstrap_user;
use env::{AppConfig, AuthSettings, load_environment};
use error::AppError;
use rocket::{Build, Rocket, tokio};
use routes::{dashboard, index, map, monitoring};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;

use sqlx::SqlitePool;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Launch error: {0}")]
    Launch(#[from] rocket::Error),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let _otel_guard = init_tracing();

    load_environment().map_err(|e| anyhow::anyhow!("Failed to load environment: {}", e))?;
    let config = AppConfig::from_env()?;
    let settings = config.auth_settings();

    let pool = SqlitePool::connect(&config.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    if let Some(bootstrap) = &config.bootstrap_user {
        ensure_bootstrap_user(&pool, bootstrap).await?;
    }

    spawn_session_cleanup(
        SqliteSessionStore::new(pool.clone()),
        settings.clone(),
        config.session_cleanup_interval_secs,
    );

    let _rocket = init_rocket(pool, settings).await.launch().await?;

    Ok(())
}

/// Periodically deletes sessions older than the configured lifetime.
fn spawn_session_cleanup(store: SqliteSessionStore, settings: AuthSettings, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            let cutoff = Utc::now() - settings.session_lifetime;
            match store.delete_sessions_created_before(cutoff).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

pub async fn init_rocket(pool: SqlitePool, settings: AuthSettings) -> Rocket<Build> {
    info!("Starting civic dashboard");

    rocket::build()
        .manage(SqliteSessionStore::new(pool.clone()))
        .manage(pool)
        .manage(settings)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_logout_all,
                api_me,
                api_me_unauthorized,
                api_get_all_users,
                api_register_user,
                api_get_municipalities,
                api_get_municipality,
                api_create_municipality,
                api_update_municipality,
                api_archive_municipality,
                api_restore_municipality,
                api_get_research_list,
                api_create_research,
                api_get_research,
                api_create_survey,
                api_get_survey,
                api_add_survey_question,
                api_submit_survey_answers,
                api_get_survey_answers,
                api_get_project_categories,
                api_create_project_category,
                api_get_projects,
                api_create_project,
                api_get_project,
                api_add_project_expense,
                api_public_map,
                api_public_monitoring,
                health,
            ],
        )
        .mount("/", routes![index, map, monitoring, dashboard])
        .register("/api", catchers![unauthorized_api, service_unavailable_api])
        .attach(TelemetryFairing)
}
