use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use tracing::{error, info, warn};
use validator::Validate;

use crate::auth::{
    AuthenticatedUser, GuardOutcome, PUBLIC_ENTRY, RequestContext, RouteGuard, SESSION_COOKIE,
    SessionStore, SqliteSessionStore, User,
};
use crate::db::{authenticate_user, create_user, get_all_users};
use crate::env::AuthSettings;
use crate::error::AppError;
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, validate_not_blank};

/// Where a successful login lands.
pub const DASHBOARD_ENTRY: &str = "/dashboard";

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_not_blank"))]
    nickname: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: String,
    pub nickname: String,
    pub created_at: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

fn session_cookie(token: String, settings: &AuthSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::seconds(
            settings.session_lifetime.num_seconds(),
        ))
        .build()
}

/// Logging in while already logged in issues a new session and leaves the
/// old one untouched.
#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    store: &State<SqliteSessionStore>,
    settings: &State<AuthSettings>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    info!(nickname = %validated.nickname, "Login attempt");

    match authenticate_user(db, &validated.nickname, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let issued = store
                .create(&user.id)
                .await
                .map_err(AppError::from)
                .validate_custom()?;

            cookies.add_private(session_cookie(issued.token().encode(), settings));

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
                redirect_url: Some(DASHBOARD_ENTRY.to_string()),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid nickname or password".to_string()),
            redirect_url: None,
        })),
    }
}

/// Ends the presented session, if it is a valid one, and clears the cookie.
#[post("/logout")]
pub async fn api_logout(
    context: RequestContext,
    cookies: &CookieJar<'_>,
    store: &State<SqliteSessionStore>,
    settings: &State<AuthSettings>,
) -> Redirect {
    if context.session_token().is_some() {
        match RouteGuard::new(store.inner(), settings.session_lifetime)
            .check(&context)
            .await
        {
            Ok(GuardOutcome::Allowed(identity)) => {
                if let Err(err) = store.invalidate(&identity.session_id).await {
                    error!(error = %err, "Failed to invalidate session on logout");
                }
            }
            Ok(GuardOutcome::Redirect(_)) => warn!("Logout with a rejected session token"),
            Err(err) => error!(error = %err, "Session store unavailable on logout"),
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Redirect::to(PUBLIC_ENTRY)
}

#[derive(Serialize, Deserialize)]
pub struct LogoutAllResponse {
    pub invalidated: u64,
}

#[post("/logout/all")]
pub async fn api_logout_all(
    user: AuthenticatedUser,
    cookies: &CookieJar<'_>,
    store: &State<SqliteSessionStore>,
) -> Result<Json<LogoutAllResponse>, Status> {
    info!(session_id = ?user.session_id(), "Logging out every session of the user");

    let invalidated = store
        .invalidate_user_sessions(user.id())
        .await
        .map_err(AppError::from)?;

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Ok(Json(LogoutAllResponse { invalidated }))
}

#[get("/me")]
pub async fn api_me(user: AuthenticatedUser) -> Json<UserData> {
    Json(UserData::from(user.user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[derive(Deserialize, Validate, Clone)]
pub struct UserRegistrationRequest {
    #[validate(length(min = 3, max = 40, message = "Nickname must be 3 to 40 characters"))]
    nickname: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

#[get("/users")]
pub async fn api_get_all_users(
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, Status> {
    let users = get_all_users(db).await?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[post("/users", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<UserRegistrationRequest>,
    user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<UserData>>, ApiError> {
    let validated = registration.validate_custom()?;

    info!(registered_by = %user.user.nickname, nickname = %validated.nickname, "Registering user");

    let created = create_user(db, validated.nickname.trim(), &validated.password)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(created))))
}
