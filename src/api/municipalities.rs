use rocket::FromForm;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::db::{
    create_municipality, get_municipality, list_municipalities, set_municipality_status,
    update_municipality,
};
use crate::models::{Municipality, MunicipalityStatus};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, STATE_CODE, validate_not_blank};

#[derive(FromForm)]
pub struct MunicipalityQueryParams {
    state: Option<String>,
    include_archived: Option<bool>,
}

#[derive(Deserialize, Validate)]
pub struct CreateMunicipalityRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 120, message = "Name is too long")
    )]
    name: String,
    #[validate(regex(path = *STATE_CODE, message = "State must be a two-letter uppercase code"))]
    state: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    longitude: f64,
}

#[derive(Deserialize, Validate)]
pub struct UpdateMunicipalityRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 120, message = "Name is too long")
    )]
    name: Option<String>,
    #[validate(regex(path = *STATE_CODE, message = "State must be a two-letter uppercase code"))]
    state: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    longitude: Option<f64>,
}

#[get("/municipalities?<params..>")]
pub async fn api_get_municipalities(
    params: MunicipalityQueryParams,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Municipality>>, Status> {
    let include_archived = params.include_archived.unwrap_or(false);

    let municipalities =
        list_municipalities(db, params.state.as_deref(), include_archived).await?;

    Ok(Json(municipalities))
}

#[get("/municipalities/<id>")]
pub async fn api_get_municipality(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Municipality>, Status> {
    Ok(Json(get_municipality(db, id).await?))
}

#[post("/municipalities", data = "<request>")]
pub async fn api_create_municipality(
    request: Json<CreateMunicipalityRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Municipality>>, ApiError> {
    let validated = request.validate_custom()?;

    let municipality = create_municipality(
        db,
        validated.name.trim(),
        &validated.state,
        validated.latitude,
        validated.longitude,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(municipality)))
}

#[put("/municipalities/<id>", data = "<request>")]
pub async fn api_update_municipality(
    id: i64,
    request: Json<UpdateMunicipalityRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Municipality>, ApiError> {
    let validated = request.validate_custom()?;

    let municipality = update_municipality(
        db,
        id,
        validated.name.as_deref().map(str::trim),
        validated.state.as_deref(),
        validated.latitude,
        validated.longitude,
    )
    .await
    .validate_custom()?;

    Ok(Json(municipality))
}

#[post("/municipalities/<id>/archive")]
pub async fn api_archive_municipality(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Municipality>, Status> {
    Ok(Json(
        set_municipality_status(db, id, MunicipalityStatus::Archived).await?,
    ))
}

#[post("/municipalities/<id>/restore")]
pub async fn api_restore_municipality(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Municipality>, Status> {
    Ok(Json(
        set_municipality_status(db, id, MunicipalityStatus::Active).await?,
    ))
}
