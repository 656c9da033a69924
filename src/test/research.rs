#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::tokio;
    use serde_json::json;

    use crate::api::{SubmitAnswersResponse, SurveyDetailResponse};
    use crate::db::{
        add_survey_question, create_research, create_survey, get_survey_answers,
        get_survey_questions, set_municipality_status, submit_survey_answers,
    };
    use crate::error::AppError;
    use crate::models::{
        MunicipalityStatus, QuestionKind, QuestionMetadata, Research, Survey, SurveyQuestion,
    };
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDb, create_standard_test_db, login_test_user, session_cookie,
        setup_test_client,
    };

    fn choice(kind: QuestionKind, options: &[&str]) -> QuestionMetadata {
        QuestionMetadata {
            kind,
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    fn free(kind: QuestionKind) -> QuestionMetadata {
        QuestionMetadata {
            kind,
            options: vec![],
        }
    }

    /// A survey with a text, a number and a single-choice question.
    async fn survey_with_questions(test_db: &TestDb) -> (Survey, Vec<SurveyQuestion>) {
        let author = test_db.user_id("admin_user").unwrap();
        let research = create_research(&test_db.pool, "Water access", "", &author)
            .await
            .unwrap();
        let survey = create_survey(&test_db.pool, research.id, "Household survey")
            .await
            .unwrap();

        let mut questions = Vec::new();
        for (prompt, metadata) in [
            ("Describe your supply", free(QuestionKind::Text)),
            ("Litres per day", free(QuestionKind::Number)),
            (
                "Main source",
                choice(QuestionKind::SingleChoice, &["well", "network", "truck"]),
            ),
        ] {
            questions.push(
                add_survey_question(&test_db.pool, survey.id, prompt, &metadata)
                    .await
                    .unwrap(),
            );
        }

        (survey, questions)
    }

    #[test]
    fn test_metadata_accepts() {
        assert!(free(QuestionKind::Text).accepts("anything"));
        assert!(!free(QuestionKind::Text).accepts("   "));

        assert!(free(QuestionKind::Number).accepts("12.5"));
        assert!(!free(QuestionKind::Number).accepts("twelve"));
        assert!(!free(QuestionKind::Number).accepts("NaN"));

        let single = choice(QuestionKind::SingleChoice, &["a", "b"]);
        assert!(single.accepts("a"));
        assert!(!single.accepts("c"));
        assert!(!single.accepts("a;b"));

        let multiple = choice(QuestionKind::MultipleChoice, &["a", "b", "c"]);
        assert!(multiple.accepts("a"));
        assert!(multiple.accepts("a;c"));
        assert!(!multiple.accepts("a;d"));
        assert!(!multiple.accepts(""));
        assert!(!multiple.accepts("a;a"));
        assert!(!multiple.accepts("a;c;a"));
    }

    #[test]
    fn test_question_kind_parses_stored_names() {
        for kind in [
            QuestionKind::Text,
            QuestionKind::Number,
            QuestionKind::SingleChoice,
            QuestionKind::MultipleChoice,
        ] {
            assert_eq!(kind.as_str().parse::<QuestionKind>(), Ok(kind));
        }
        assert!("checkbox".parse::<QuestionKind>().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_questions_get_distinct_positions() {
        let test_db = create_standard_test_db().await;
        let (survey, _) = survey_with_questions(&test_db).await;
        let metadata = free(QuestionKind::Text);

        let (first, second) = tokio::join!(
            add_survey_question(&test_db.pool, survey.id, "Anything else?", &metadata),
            add_survey_question(&test_db.pool, survey.id, "Contact details", &metadata),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.position, second.position);

        let positions: Vec<i64> = get_survey_questions(&test_db.pool, survey.id)
            .await
            .unwrap()
            .iter()
            .map(|q| q.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_questions_are_ordered() {
        let test_db = create_standard_test_db().await;
        let (survey, added) = survey_with_questions(&test_db).await;

        let questions = get_survey_questions(&test_db.pool, survey.id).await.unwrap();

        let positions: Vec<i64> = questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(questions[2].metadata, added[2].metadata);
        assert_eq!(questions[2].metadata.options, vec!["well", "network", "truck"]);
    }

    #[tokio::test]
    async fn test_survey_requires_research() {
        let test_db = create_standard_test_db().await;

        let result = create_survey(&test_db.pool, 9999, "Orphan").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_answers() {
        let test_db = create_standard_test_db().await;
        let (survey, questions) = survey_with_questions(&test_db).await;
        let respondent = test_db.user_id("field_user").unwrap();
        let municipality = test_db.municipality_id("Springfield");

        let answers = vec![
            (questions[0].id, "Shared tap".to_string()),
            (questions[1].id, "40".to_string()),
            (questions[2].id, "well".to_string()),
        ];

        let ids = submit_survey_answers(&test_db.pool, survey.id, municipality, &respondent, &answers)
            .await
            .expect("Valid answers should be stored");
        assert_eq!(ids.len(), 3);

        let stored = get_survey_answers(&test_db.pool, survey.id).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|a| a.municipality_id == municipality));
        assert!(stored.iter().all(|a| a.respondent_id.as_deref() == Some(respondent.as_str())));
    }

    #[tokio::test]
    async fn test_invalid_answer_writes_nothing() {
        let test_db = create_standard_test_db().await;
        let (survey, questions) = survey_with_questions(&test_db).await;
        let respondent = test_db.user_id("field_user").unwrap();

        let answers = vec![
            (questions[0].id, "Fine".to_string()),
            (questions[2].id, "river".to_string()),
        ];

        let result = submit_survey_answers(&test_db.pool, survey.id, None, &respondent, &answers).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let stored = get_survey_answers(&test_db.pool, survey.id).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_answer_must_target_this_survey() {
        let test_db = create_standard_test_db().await;
        let (first, _) = survey_with_questions(&test_db).await;
        let (_, other_questions) = survey_with_questions(&test_db).await;
        let respondent = test_db.user_id("field_user").unwrap();

        let answers = vec![(other_questions[0].id, "Borrowed".to_string())];
        let result = submit_survey_answers(&test_db.pool, first.id, None, &respondent, &answers).await;

        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = submit_survey_answers(&test_db.pool, first.id, None, &respondent, &[]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_answers_for_archived_municipality_are_refused() {
        let test_db = create_standard_test_db().await;
        let (survey, questions) = survey_with_questions(&test_db).await;
        let respondent = test_db.user_id("field_user").unwrap();
        let springfield = test_db.municipality_id("Springfield").unwrap();

        set_municipality_status(&test_db.pool, springfield, MunicipalityStatus::Archived)
            .await
            .unwrap();

        let answers = vec![(questions[1].id, "10".to_string())];
        let result =
            submit_survey_answers(&test_db.pool, survey.id, Some(springfield), &respondent, &answers)
                .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_research_api_flow() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/research")
            .header(ContentType::JSON)
            .private_cookie(session_cookie(&token))
            .body(json!({ "title": "Sanitation", "description": "2025 round" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let research: Research =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(research.created_by, test_db.user_id("admin_user"));

        let response = client
            .post(format!("/api/research/{}/surveys", research.id))
            .header(ContentType::JSON)
            .private_cookie(session_cookie(&token))
            .body(json!({ "title": "Baseline" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let survey: Survey = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        let response = client
            .post(format!("/api/surveys/{}/questions", survey.id))
            .header(ContentType::JSON)
            .private_cookie(session_cookie(&token))
            .body(
                json!({
                    "prompt": "Facilities available",
                    "kind": "multiple_choice",
                    "options": ["toilet", "shower", "sink"]
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let question: SurveyQuestion =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        let response = client
            .get(format!("/api/surveys/{}", survey.id))
            .private_cookie(session_cookie(&token))
            .dispatch()
            .await;
        let detail: SurveyDetailResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(detail.questions.len(), 1);
        assert_eq!(detail.questions[0].metadata.kind, QuestionKind::MultipleChoice);

        let response = client
            .post(format!("/api/surveys/{}/answers", survey.id))
            .header(ContentType::JSON)
            .private_cookie(session_cookie(&token))
            .body(
                json!({
                    "municipality_id": test_db.municipality_id("Riverside"),
                    "answers": [{ "question_id": question.id, "value": "toilet;sink" }]
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let submitted: SubmitAnswersResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(submitted.answer_ids.len(), 1);

        let response = client
            .get(format!("/api/research/{}", research.id))
            .private_cookie(session_cookie(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_question_options_are_validated() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;
        let (survey, _) = survey_with_questions(&test_db).await;

        for body in [
            json!({ "prompt": "Pick", "kind": "single_choice", "options": ["only"] }),
            json!({ "prompt": "Pick", "kind": "single_choice", "options": ["a", "a"] }),
            json!({ "prompt": "Pick", "kind": "multiple_choice", "options": ["a;b", "c"] }),
            json!({ "prompt": "Count", "kind": "number", "options": ["1", "2"] }),
        ] {
            let response = client
                .post(format!("/api/surveys/{}/questions", survey.id))
                .header(ContentType::JSON)
                .private_cookie(session_cookie(&token))
                .body(body.to_string())
                .dispatch()
                .await;

            assert_eq!(
                response.status(),
                Status::UnprocessableEntity,
                "Body {} should be rejected",
                body
            );
        }

        let response = client
            .post(format!("/api/surveys/{}/answers", survey.id))
            .header(ContentType::JSON)
            .private_cookie(session_cookie(&token))
            .body(json!({ "answers": [] }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
