use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::db::{
    add_project_expense, create_project, create_project_category, get_all_project_categories,
    get_project, get_project_expenses, list_projects, total_expense_cents,
};
use crate::models::{Project, ProjectCategory, ProjectExpense};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, validate_not_blank};

#[derive(Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 80, message = "Name is too long")
    )]
    name: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 200, message = "Name is too long")
    )]
    name: String,
    #[serde(default)]
    description: String,
    category_id: i64,
    municipality_id: Option<i64>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    longitude: f64,
}

#[derive(Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(custom(function = "validate_not_blank"))]
    description: String,
    #[validate(range(
        min = 1i64,
        max = 1_000_000_000_000i64,
        message = "Amount must be between 1 and 1000000000000 cents"
    ))]
    amount_cents: i64,
    spent_on: NaiveDate,
}

#[derive(Serialize, Deserialize)]
pub struct ProjectDetailResponse {
    pub project: Project,
    pub expenses: Vec<ProjectExpense>,
    pub total_expenses_cents: i64,
}

#[get("/project-categories")]
pub async fn api_get_project_categories(
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ProjectCategory>>, Status> {
    Ok(Json(get_all_project_categories(db).await?))
}

#[post("/project-categories", data = "<request>")]
pub async fn api_create_project_category(
    request: Json<CreateCategoryRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ProjectCategory>>, ApiError> {
    let validated = request.validate_custom()?;

    let category = create_project_category(db, validated.name.trim())
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(category)))
}

#[get("/projects?<category_id>")]
pub async fn api_get_projects(
    category_id: Option<i64>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Project>>, Status> {
    Ok(Json(list_projects(db, category_id).await?))
}

#[post("/projects", data = "<request>")]
pub async fn api_create_project(
    request: Json<CreateProjectRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Project>>, ApiError> {
    let validated = request.validate_custom()?;

    let project = create_project(
        db,
        validated.name.trim(),
        validated.description.trim(),
        validated.category_id,
        validated.municipality_id,
        validated.latitude,
        validated.longitude,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(project)))
}

#[get("/projects/<id>")]
pub async fn api_get_project(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProjectDetailResponse>, Status> {
    let project = get_project(db, id).await?;
    let expenses = get_project_expenses(db, id).await?;
    let total_expenses_cents = total_expense_cents(&expenses)?;

    Ok(Json(ProjectDetailResponse {
        project,
        expenses,
        total_expenses_cents,
    }))
}

#[post("/projects/<project_id>/expenses", data = "<request>")]
pub async fn api_add_project_expense(
    project_id: i64,
    request: Json<CreateExpenseRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ProjectExpense>>, ApiError> {
    let validated = request.validate_custom()?;

    let expense = add_project_expense(
        db,
        project_id,
        validated.description.trim(),
        validated.amount_cents,
        validated.spent_on,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(expense)))
}
