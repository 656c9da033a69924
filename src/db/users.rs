use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{DbUser, User},
    env::BootstrapUser,
    error::AppError,
};

#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

#[instrument]
pub async fn find_user(pool: &Pool<Sqlite>, id: &str) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, nickname, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: &str) -> Result<User, AppError> {
    info!("Fetching user by ID");
    match find_user(pool, id).await? {
        Some(user) => Ok(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_nickname(
    pool: &Pool<Sqlite>,
    nickname: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, nickname, created_at FROM users WHERE nickname = ?",
    )
    .bind(nickname)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, nickname, created_at FROM users ORDER BY nickname",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn count_users(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[instrument(skip_all, fields(nickname = %nickname))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    nickname: &str,
    password: &str,
) -> Result<User, AppError> {
    info!("Creating new user");

    if find_user_by_nickname(pool, nickname).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Nickname '{}' already exists",
            nickname
        )));
    }

    let id = Uuid::new_v4().to_string();
    let password_hash = bcrypt::hash(password, BCRYPT_COST)?;

    sqlx::query("INSERT INTO users (id, nickname, password_hash) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(nickname)
        .bind(&password_hash)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, format!("Nickname '{}' already exists", nickname))
        })?;

    get_user(pool, &id).await
}

/// Returns the user when the password matches, `None` otherwise.
#[instrument(skip_all, fields(nickname = %nickname))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    nickname: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT id, password_hash FROM users WHERE nickname = ?",
    )
    .bind(nickname)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id, password_hash)) => match bcrypt::verify(password, &password_hash) {
            Ok(true) => find_user(pool, &id).await,
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Creates the configured first user when the users table is empty.
#[instrument(skip_all)]
pub async fn ensure_bootstrap_user(
    pool: &Pool<Sqlite>,
    bootstrap: &BootstrapUser,
) -> Result<Option<User>, AppError> {
    if count_users(pool).await? > 0 {
        return Ok(None);
    }

    info!(nickname = %bootstrap.nickname, "Creating bootstrap user");
    create_user(pool, &bootstrap.nickname, &bootstrap.password)
        .await
        .map(Some)
}
