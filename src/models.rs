use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

/// Lifecycle of a municipality row. Stored as the `is_deleted` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MunicipalityStatus {
    Active,
    Archived,
}

impl MunicipalityStatus {
    pub fn from_is_deleted(is_deleted: bool) -> Self {
        if is_deleted {
            MunicipalityStatus::Archived
        } else {
            MunicipalityStatus::Active
        }
    }

    pub fn is_deleted(self) -> bool {
        matches!(self, MunicipalityStatus::Archived)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Municipality {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: MunicipalityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbMunicipality {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_deleted: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbMunicipality> for Municipality {
    fn from(db: DbMunicipality) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            state: db.state.unwrap_or_default(),
            latitude: db.latitude.unwrap_or_default(),
            longitude: db.longitude.unwrap_or_default(),
            status: MunicipalityStatus::from_is_deleted(db.is_deleted.unwrap_or_default()),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Research {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbResearch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbResearch> for Research {
    fn from(db: DbResearch) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            created_by: db.created_by,
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Survey {
    pub id: i64,
    pub research_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSurvey {
    pub id: Option<i64>,
    pub research_id: Option<i64>,
    pub title: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbSurvey> for Survey {
    fn from(db: DbSurvey) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            research_id: db.research_id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Number,
    SingleChoice,
    MultipleChoice,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Number => "number",
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultipleChoice => "multiple_choice",
        }
    }

    pub fn takes_options(&self) -> bool {
        matches!(
            self,
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice
        )
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(QuestionKind::Text),
            "number" => Ok(QuestionKind::Number),
            "single_choice" => Ok(QuestionKind::SingleChoice),
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            other => Err(format!("Unknown question kind '{}'", other)),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Separator between selected options in a multiple-choice answer.
pub const MULTIPLE_CHOICE_SEPARATOR: char = ';';

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionMetadata {
    pub kind: QuestionKind,
    pub options: Vec<String>,
}

impl QuestionMetadata {
    /// Checks an answer value against the question type.
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            QuestionKind::Text => !value.trim().is_empty(),
            QuestionKind::Number => value.trim().parse::<f64>().is_ok_and(|n| n.is_finite()),
            QuestionKind::SingleChoice => self.options.iter().any(|o| o == value),
            QuestionKind::MultipleChoice => {
                // Each option may be selected at most once.
                let mut seen = HashSet::new();
                value
                    .split(MULTIPLE_CHOICE_SEPARATOR)
                    .all(|choice| self.options.iter().any(|o| o == choice) && seen.insert(choice))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurveyQuestion {
    pub id: i64,
    pub survey_id: i64,
    pub position: i64,
    pub prompt: String,
    pub metadata: QuestionMetadata,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSurveyQuestion {
    pub id: Option<i64>,
    pub survey_id: Option<i64>,
    pub position: Option<i64>,
    pub prompt: Option<String>,
    pub kind: Option<String>,
    pub options: Option<String>,
}

impl From<DbSurveyQuestion> for SurveyQuestion {
    fn from(db: DbSurveyQuestion) -> Self {
        let kind = db
            .kind
            .as_deref()
            .and_then(|raw| raw.parse::<QuestionKind>().ok())
            .unwrap_or(QuestionKind::Text);
        let options = db
            .options
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();

        Self {
            id: db.id.unwrap_or_default(),
            survey_id: db.survey_id.unwrap_or_default(),
            position: db.position.unwrap_or_default(),
            prompt: db.prompt.unwrap_or_default(),
            metadata: QuestionMetadata { kind, options },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurveyAnswer {
    pub id: i64,
    pub question_id: i64,
    pub municipality_id: Option<i64>,
    pub respondent_id: Option<String>,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSurveyAnswer {
    pub id: Option<i64>,
    pub question_id: Option<i64>,
    pub municipality_id: Option<i64>,
    pub respondent_id: Option<String>,
    pub value: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbSurveyAnswer> for SurveyAnswer {
    fn from(db: DbSurveyAnswer) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            question_id: db.question_id.unwrap_or_default(),
            municipality_id: db.municipality_id,
            respondent_id: db.respondent_id,
            value: db.value.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct ProjectCategory {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub category_name: String, // Denormalized for the map
    pub municipality_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProject {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub municipality_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbProject> for Project {
    fn from(db: DbProject) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            category_id: db.category_id.unwrap_or_default(),
            category_name: db.category_name.unwrap_or_default(),
            municipality_id: db.municipality_id,
            latitude: db.latitude.unwrap_or_default(),
            longitude: db.longitude.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectExpense {
    pub id: i64,
    pub project_id: i64,
    pub description: String,
    pub amount_cents: i64,
    pub spent_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProjectExpense {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub spent_on: Option<NaiveDate>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbProjectExpense> for ProjectExpense {
    fn from(db: DbProjectExpense) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            project_id: db.project_id.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            amount_cents: db.amount_cents.unwrap_or_default(),
            spent_on: db.spent_on.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MonitoringSummary {
    pub active_municipalities: i64,
    pub municipalities_by_state: Vec<StateCount>,
    pub research_count: i64,
    pub survey_count: i64,
    pub answer_count: i64,
    pub project_count: i64,
    pub total_expenses_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct StateCount {
    pub state: String,
    pub count: i64,
}
