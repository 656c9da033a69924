use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::error::AppError;
use crate::models::{MonitoringSummary, StateCount};

async fn count(pool: &Pool<Sqlite>, query: &str) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(query).fetch_one(pool).await?)
}

#[instrument]
pub async fn get_monitoring_summary(pool: &Pool<Sqlite>) -> Result<MonitoringSummary, AppError> {
    let municipalities_by_state = sqlx::query_as::<_, StateCount>(
        "SELECT state, COUNT(*) AS count FROM municipalities
         WHERE is_deleted = 0 GROUP BY state ORDER BY state",
    )
    .fetch_all(pool)
    .await?;

    Ok(MonitoringSummary {
        active_municipalities: municipalities_by_state.iter().map(|s| s.count).sum(),
        municipalities_by_state,
        research_count: count(pool, "SELECT COUNT(*) FROM research").await?,
        survey_count: count(pool, "SELECT COUNT(*) FROM surveys").await?,
        answer_count: count(pool, "SELECT COUNT(*) FROM survey_answers").await?,
        project_count: count(pool, "SELECT COUNT(*) FROM projects").await?,
        total_expenses_cents: count(
            pool,
            // TOTAL() is floating point and never raises; the cast saturates.
            "SELECT CAST(TOTAL(amount_cents) AS INTEGER) FROM project_expenses",
        )
        .await?,
    })
}
