use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbMunicipality, Municipality, MunicipalityStatus};

const MUNICIPALITY_COLUMNS: &str =
    "id, name, state, latitude, longitude, is_deleted, created_at, updated_at";

#[instrument]
pub async fn list_municipalities(
    pool: &Pool<Sqlite>,
    state: Option<&str>,
    include_archived: bool,
) -> Result<Vec<Municipality>, AppError> {
    info!("Listing municipalities");

    let query = format!(
        "SELECT {} FROM municipalities
         WHERE (? IS NULL OR state = ?) AND (? OR is_deleted = 0)
         ORDER BY state, name",
        MUNICIPALITY_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbMunicipality>(&query)
        .bind(state)
        .bind(state)
        .bind(include_archived)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Municipality::from).collect())
}

/// Escapes LIKE wildcards so the fragment matches literally. Pairs with `ESCAPE '\'`.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Active municipalities whose name contains `name_fragment`, for the public map.
#[instrument]
pub async fn search_active_municipalities(
    pool: &Pool<Sqlite>,
    name_fragment: Option<&str>,
    state: Option<&str>,
) -> Result<Vec<Municipality>, AppError> {
    let pattern = name_fragment
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(q)));

    let query = format!(
        "SELECT {} FROM municipalities
         WHERE is_deleted = 0
           AND (? IS NULL OR name LIKE ? ESCAPE '\\')
           AND (? IS NULL OR state = ?)
         ORDER BY name",
        MUNICIPALITY_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbMunicipality>(&query)
        .bind(&pattern)
        .bind(&pattern)
        .bind(state)
        .bind(state)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Municipality::from).collect())
}

#[instrument]
pub async fn get_municipality(pool: &Pool<Sqlite>, id: i64) -> Result<Municipality, AppError> {
    let query = format!(
        "SELECT {} FROM municipalities WHERE id = ?",
        MUNICIPALITY_COLUMNS
    );

    let row = sqlx::query_as::<_, DbMunicipality>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(municipality) => Ok(Municipality::from(municipality)),
        _ => Err(AppError::NotFound(format!(
            "Municipality with id {} not found",
            id
        ))),
    }
}

#[instrument]
pub async fn create_municipality(
    pool: &Pool<Sqlite>,
    name: &str,
    state: &str,
    latitude: f64,
    longitude: f64,
) -> Result<Municipality, AppError> {
    info!("Creating municipality");

    let res = sqlx::query(
        "INSERT INTO municipalities (name, state, latitude, longitude) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(state)
    .bind(latitude)
    .bind(longitude)
    .execute(pool)
    .await
    .map_err(|e| duplicate_municipality(e, state, name))?;

    get_municipality(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn update_municipality(
    pool: &Pool<Sqlite>,
    id: i64,
    name: Option<&str>,
    state: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Municipality, AppError> {
    info!("Updating municipality");

    let current = get_municipality(pool, id).await?;

    let name = name.unwrap_or(&current.name);
    let state = state.unwrap_or(&current.state);
    let latitude = latitude.unwrap_or(current.latitude);
    let longitude = longitude.unwrap_or(current.longitude);

    sqlx::query(
        "UPDATE municipalities
         SET name = ?, state = ?, latitude = ?, longitude = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(name)
    .bind(state)
    .bind(latitude)
    .bind(longitude)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| duplicate_municipality(e, state, name))?;

    get_municipality(pool, id).await
}

#[instrument]
pub async fn set_municipality_status(
    pool: &Pool<Sqlite>,
    id: i64,
    status: MunicipalityStatus,
) -> Result<Municipality, AppError> {
    info!(status = ?status, "Changing municipality status");

    let result = sqlx::query(
        "UPDATE municipalities SET is_deleted = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(status.is_deleted())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Municipality with id {} not found",
            id
        )));
    }

    get_municipality(pool, id).await
}

fn duplicate_municipality(error: sqlx::Error, state: &str, name: &str) -> AppError {
    AppError::from_unique_violation(
        error,
        format!("Municipality '{}' already exists in state {}", name, state),
    )
}
