use std::collections::HashMap;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    DbResearch, DbSurvey, DbSurveyAnswer, DbSurveyQuestion, QuestionMetadata, Research, Survey,
    SurveyAnswer, SurveyQuestion,
};

#[instrument]
pub async fn list_research(pool: &Pool<Sqlite>) -> Result<Vec<Research>, AppError> {
    let rows = sqlx::query_as::<_, DbResearch>(
        "SELECT id, title, description, created_by, created_at FROM research ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Research::from).collect())
}

#[instrument]
pub async fn get_research(pool: &Pool<Sqlite>, id: i64) -> Result<Research, AppError> {
    let row = sqlx::query_as::<_, DbResearch>(
        "SELECT id, title, description, created_by, created_at FROM research WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(research) => Ok(Research::from(research)),
        _ => Err(AppError::NotFound(format!(
            "Research with id {} not found",
            id
        ))),
    }
}

#[instrument]
pub async fn create_research(
    pool: &Pool<Sqlite>,
    title: &str,
    description: &str,
    created_by: &str,
) -> Result<Research, AppError> {
    info!("Creating research");

    let res =
        sqlx::query("INSERT INTO research (title, description, created_by) VALUES (?, ?, ?)")
            .bind(title)
            .bind(description)
            .bind(created_by)
            .execute(pool)
            .await?;

    get_research(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_surveys_for_research(
    pool: &Pool<Sqlite>,
    research_id: i64,
) -> Result<Vec<Survey>, AppError> {
    let rows = sqlx::query_as::<_, DbSurvey>(
        "SELECT id, research_id, title, created_at FROM surveys WHERE research_id = ? ORDER BY id",
    )
    .bind(research_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Survey::from).collect())
}

#[instrument]
pub async fn get_survey(pool: &Pool<Sqlite>, id: i64) -> Result<Survey, AppError> {
    let row = sqlx::query_as::<_, DbSurvey>(
        "SELECT id, research_id, title, created_at FROM surveys WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(survey) => Ok(Survey::from(survey)),
        _ => Err(AppError::NotFound(format!("Survey with id {} not found", id))),
    }
}

#[instrument]
pub async fn create_survey(
    pool: &Pool<Sqlite>,
    research_id: i64,
    title: &str,
) -> Result<Survey, AppError> {
    info!("Creating survey");

    get_research(pool, research_id).await?;

    let res = sqlx::query("INSERT INTO surveys (research_id, title) VALUES (?, ?)")
        .bind(research_id)
        .bind(title)
        .execute(pool)
        .await?;

    get_survey(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_survey_questions(
    pool: &Pool<Sqlite>,
    survey_id: i64,
) -> Result<Vec<SurveyQuestion>, AppError> {
    let rows = sqlx::query_as::<_, DbSurveyQuestion>(
        "SELECT q.id, q.survey_id, q.position, q.prompt, m.kind, m.options
         FROM survey_questions q
         LEFT JOIN survey_question_metadata m ON m.question_id = q.id
         WHERE q.survey_id = ?
         ORDER BY q.position",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SurveyQuestion::from).collect())
}

/// Appends a question at the end of the survey together with its metadata.
#[instrument]
pub async fn add_survey_question(
    pool: &Pool<Sqlite>,
    survey_id: i64,
    prompt: &str,
    metadata: &QuestionMetadata,
) -> Result<SurveyQuestion, AppError> {
    info!("Adding survey question");

    get_survey(pool, survey_id).await?;

    let options = serde_json::to_string(&metadata.options)?;

    let mut tx = pool.begin().await?;

    // Position is read and written by one statement so concurrent appends
    // cannot claim the same slot.
    let (question_id, position) = sqlx::query_as::<_, (i64, i64)>(
        "INSERT INTO survey_questions (survey_id, position, prompt)
         SELECT ?, COALESCE(MAX(position), 0) + 1, ?
         FROM survey_questions WHERE survey_id = ?
         RETURNING id, position",
    )
    .bind(survey_id)
    .bind(prompt)
    .bind(survey_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO survey_question_metadata (question_id, kind, options) VALUES (?, ?, ?)",
    )
    .bind(question_id)
    .bind(metadata.kind.as_str())
    .bind(&options)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(SurveyQuestion {
        id: question_id,
        survey_id,
        position,
        prompt: prompt.to_string(),
        metadata: metadata.clone(),
    })
}

/// Stores one respondent's answers to a survey in a single transaction.
///
/// Every answer must target a question of this survey and satisfy the
/// question's metadata; otherwise nothing is written.
#[instrument(skip(answers))]
pub async fn submit_survey_answers(
    pool: &Pool<Sqlite>,
    survey_id: i64,
    municipality_id: Option<i64>,
    respondent_id: &str,
    answers: &[(i64, String)],
) -> Result<Vec<i64>, AppError> {
    info!(answer_count = answers.len(), "Submitting survey answers");

    if answers.is_empty() {
        return Err(AppError::Validation(
            "At least one answer is required".to_string(),
        ));
    }

    let questions: HashMap<i64, SurveyQuestion> = get_survey_questions(pool, survey_id)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

    if questions.is_empty() {
        get_survey(pool, survey_id).await?;
    }

    for (question_id, value) in answers {
        let question = questions.get(question_id).ok_or_else(|| {
            AppError::Validation(format!(
                "Question {} does not belong to survey {}",
                question_id, survey_id
            ))
        })?;

        if !question.metadata.accepts(value) {
            return Err(AppError::Validation(format!(
                "Answer {:?} is not valid for question {}",
                value, question_id
            )));
        }
    }

    if let Some(municipality_id) = municipality_id {
        let municipality = super::get_municipality(pool, municipality_id).await?;
        if municipality.status.is_deleted() {
            return Err(AppError::Validation(format!(
                "Municipality {} is archived",
                municipality_id
            )));
        }
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(answers.len());

    for (question_id, value) in answers {
        let id = sqlx::query(
            "INSERT INTO survey_answers (question_id, municipality_id, respondent_id, value)
             VALUES (?, ?, ?, ?)",
        )
        .bind(question_id)
        .bind(municipality_id)
        .bind(respondent_id)
        .bind(value)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        ids.push(id);
    }

    tx.commit().await?;

    Ok(ids)
}

#[instrument]
pub async fn get_survey_answers(
    pool: &Pool<Sqlite>,
    survey_id: i64,
) -> Result<Vec<SurveyAnswer>, AppError> {
    let rows = sqlx::query_as::<_, DbSurveyAnswer>(
        "SELECT a.id, a.question_id, a.municipality_id, a.respondent_id, a.value, a.created_at
         FROM survey_answers a
         JOIN survey_questions q ON q.id = a.question_id
         WHERE q.survey_id = ?
         ORDER BY a.id",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SurveyAnswer::from).collect())
}
