use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbProject, DbProjectExpense, Project, ProjectCategory, ProjectExpense};

/// Largest single expense accepted, in cents.
pub const MAX_EXPENSE_CENTS: i64 = 1_000_000_000_000;

const PROJECT_SELECT: &str = "SELECT p.id, p.name, p.description, p.category_id, c.name AS category_name,
        p.municipality_id, p.latitude, p.longitude, p.created_at
 FROM projects p
 JOIN project_categories c ON c.id = p.category_id";

#[instrument]
pub async fn get_all_project_categories(
    pool: &Pool<Sqlite>,
) -> Result<Vec<ProjectCategory>, AppError> {
    let categories = sqlx::query_as::<_, ProjectCategory>(
        "SELECT id, name FROM project_categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

#[instrument]
pub async fn create_project_category(
    pool: &Pool<Sqlite>,
    name: &str,
) -> Result<ProjectCategory, AppError> {
    info!("Creating project category");

    let res = sqlx::query("INSERT INTO project_categories (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, format!("Category '{}' already exists", name))
        })?;

    Ok(ProjectCategory {
        id: res.last_insert_rowid(),
        name: name.to_string(),
    })
}

async fn project_category_exists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM project_categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

#[instrument]
pub async fn list_projects(
    pool: &Pool<Sqlite>,
    category_id: Option<i64>,
) -> Result<Vec<Project>, AppError> {
    let query = format!(
        "{} WHERE (? IS NULL OR p.category_id = ?) ORDER BY p.name",
        PROJECT_SELECT
    );

    let rows = sqlx::query_as::<_, DbProject>(&query)
        .bind(category_id)
        .bind(category_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Project::from).collect())
}

#[instrument]
pub async fn get_project(pool: &Pool<Sqlite>, id: i64) -> Result<Project, AppError> {
    let query = format!("{} WHERE p.id = ?", PROJECT_SELECT);

    let row = sqlx::query_as::<_, DbProject>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(project) => Ok(Project::from(project)),
        _ => Err(AppError::NotFound(format!("Project with id {} not found", id))),
    }
}

#[instrument]
pub async fn create_project(
    pool: &Pool<Sqlite>,
    name: &str,
    description: &str,
    category_id: i64,
    municipality_id: Option<i64>,
    latitude: f64,
    longitude: f64,
) -> Result<Project, AppError> {
    info!("Creating project");

    if !project_category_exists(pool, category_id).await? {
        return Err(AppError::NotFound(format!(
            "Project category with id {} not found",
            category_id
        )));
    }

    if let Some(municipality_id) = municipality_id {
        super::get_municipality(pool, municipality_id).await?;
    }

    let res = sqlx::query(
        "INSERT INTO projects (name, description, category_id, municipality_id, latitude, longitude)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(category_id)
    .bind(municipality_id)
    .bind(latitude)
    .bind(longitude)
    .execute(pool)
    .await?;

    get_project(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn add_project_expense(
    pool: &Pool<Sqlite>,
    project_id: i64,
    description: &str,
    amount_cents: i64,
    spent_on: NaiveDate,
) -> Result<ProjectExpense, AppError> {
    info!("Recording project expense");

    if amount_cents <= 0 || amount_cents > MAX_EXPENSE_CENTS {
        return Err(AppError::Validation(format!(
            "Expense amount must be between 1 and {} cents",
            MAX_EXPENSE_CENTS
        )));
    }

    get_project(pool, project_id).await?;

    let res = sqlx::query(
        "INSERT INTO project_expenses (project_id, description, amount_cents, spent_on)
         VALUES (?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(description)
    .bind(amount_cents)
    .bind(spent_on)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, DbProjectExpense>(
        "SELECT id, project_id, description, amount_cents, spent_on, created_at
         FROM project_expenses WHERE id = ?",
    )
    .bind(res.last_insert_rowid())
    .fetch_one(pool)
    .await?;

    Ok(ProjectExpense::from(row))
}

#[instrument]
pub async fn get_project_expenses(
    pool: &Pool<Sqlite>,
    project_id: i64,
) -> Result<Vec<ProjectExpense>, AppError> {
    let rows = sqlx::query_as::<_, DbProjectExpense>(
        "SELECT id, project_id, description, amount_cents, spent_on, created_at
         FROM project_expenses WHERE project_id = ? ORDER BY spent_on, id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProjectExpense::from).collect())
}

/// Sum of a project's expenses. Fails instead of wrapping on overflow.
pub fn total_expense_cents(expenses: &[ProjectExpense]) -> Result<i64, AppError> {
    expenses
        .iter()
        .try_fold(0i64, |total, e| total.checked_add(e.amount_cents))
        .ok_or_else(|| AppError::Internal("Project expense total overflows".to_string()))
}
