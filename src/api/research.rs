use std::collections::HashSet;

use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::{Validate, ValidationError};

use crate::auth::AuthenticatedUser;
use crate::db::{
    add_survey_question, create_research, create_survey, get_research, get_survey,
    get_survey_answers, get_survey_questions, get_surveys_for_research, list_research,
    submit_survey_answers,
};
use crate::models::{
    QuestionKind, QuestionMetadata, Research, Survey, SurveyAnswer, SurveyQuestion,
};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, validate_not_blank};

#[derive(Deserialize, Validate)]
pub struct CreateResearchRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 200, message = "Title is too long")
    )]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Serialize, Deserialize)]
pub struct ResearchDetailResponse {
    pub research: Research,
    pub surveys: Vec<Survey>,
}

#[derive(Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 200, message = "Title is too long")
    )]
    title: String,
}

#[derive(Serialize, Deserialize)]
pub struct SurveyDetailResponse {
    pub survey: Survey,
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Deserialize, Validate)]
#[validate(schema(function = "validate_question_options", skip_on_field_errors = false))]
pub struct CreateQuestionRequest {
    #[validate(custom(function = "validate_not_blank"))]
    prompt: String,
    kind: QuestionKind,
    #[serde(default)]
    options: Vec<String>,
}

fn validate_question_options(request: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let fail = |message: &'static str| -> Result<(), ValidationError> {
        let mut error = ValidationError::new("options");
        error.message = Some(message.into());
        Err(error)
    };

    if !request.kind.takes_options() {
        if !request.options.is_empty() {
            return fail("Only choice questions take options");
        }
        return Ok(());
    }

    if request.options.len() < 2 {
        return fail("Choice questions need at least two options");
    }

    let mut seen = HashSet::new();
    for option in &request.options {
        let option = option.trim();
        if option.is_empty() || option.contains(crate::models::MULTIPLE_CHOICE_SEPARATOR) {
            return fail("Options must be non-empty and must not contain ';'");
        }
        if !seen.insert(option) {
            return fail("Options must be distinct");
        }
    }

    Ok(())
}

#[derive(Deserialize)]
pub struct AnswerInput {
    question_id: i64,
    value: String,
}

#[derive(Deserialize)]
pub struct SubmitAnswersRequest {
    municipality_id: Option<i64>,
    answers: Vec<AnswerInput>,
}

#[derive(Serialize, Deserialize)]
pub struct SubmitAnswersResponse {
    pub answer_ids: Vec<i64>,
}

#[get("/research")]
pub async fn api_get_research_list(
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Research>>, Status> {
    Ok(Json(list_research(db).await?))
}

#[post("/research", data = "<request>")]
pub async fn api_create_research(
    request: Json<CreateResearchRequest>,
    user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Research>>, ApiError> {
    let validated = request.validate_custom()?;

    let research = create_research(
        db,
        validated.title.trim(),
        validated.description.trim(),
        user.id(),
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(research)))
}

#[get("/research/<id>")]
pub async fn api_get_research(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ResearchDetailResponse>, Status> {
    let research = get_research(db, id).await?;
    let surveys = get_surveys_for_research(db, id).await?;

    Ok(Json(ResearchDetailResponse { research, surveys }))
}

#[post("/research/<research_id>/surveys", data = "<request>")]
pub async fn api_create_survey(
    research_id: i64,
    request: Json<CreateSurveyRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Survey>>, ApiError> {
    let validated = request.validate_custom()?;

    let survey = create_survey(db, research_id, validated.title.trim())
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(survey)))
}

#[get("/surveys/<id>")]
pub async fn api_get_survey(
    id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SurveyDetailResponse>, Status> {
    let survey = get_survey(db, id).await?;
    let questions = get_survey_questions(db, id).await?;

    Ok(Json(SurveyDetailResponse { survey, questions }))
}

#[post("/surveys/<survey_id>/questions", data = "<request>")]
pub async fn api_add_survey_question(
    survey_id: i64,
    request: Json<CreateQuestionRequest>,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<SurveyQuestion>>, ApiError> {
    let validated = request.validate_custom()?;

    let metadata = QuestionMetadata {
        kind: validated.kind,
        options: validated
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .collect(),
    };

    let question = add_survey_question(db, survey_id, validated.prompt.trim(), &metadata)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(question)))
}

#[post("/surveys/<survey_id>/answers", data = "<request>")]
pub async fn api_submit_survey_answers(
    survey_id: i64,
    request: Json<SubmitAnswersRequest>,
    user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<SubmitAnswersResponse>>, ApiError> {
    let request = request.into_inner();
    let answers: Vec<(i64, String)> = request
        .answers
        .into_iter()
        .map(|a| (a.question_id, a.value))
        .collect();

    let answer_ids =
        submit_survey_answers(db, survey_id, request.municipality_id, user.id(), &answers)
            .await
            .validate_custom()?;

    Ok(Custom(Status::Created, Json(SubmitAnswersResponse { answer_ids })))
}

#[get("/surveys/<survey_id>/answers")]
pub async fn api_get_survey_answers(
    survey_id: i64,
    _user: AuthenticatedUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SurveyAnswer>>, Status> {
    get_survey(db, survey_id).await?;

    Ok(Json(get_survey_answers(db, survey_id).await?))
}
