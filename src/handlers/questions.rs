// src/handlers/questions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::documents::fetch_owned_document,
    models::question::{CreateQuestionRequest, Question, TYPE_QCM},
    utils::jwt::Claims,
};

/// Bulk-ingests generated questions into a document's bank. Question
/// generation itself (the LLM call) happens upstream; this endpoint
/// persists its output. QCM questions must carry choices and an answer.
pub async fn create_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(document_id): Path<i64>,
    Json(payload): Json<Vec<CreateQuestionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let document = fetch_owned_document(&pool, document_id, claims.user_id()).await?;

    if payload.is_empty() {
        return Err(AppError::BadRequest("No questions provided".to_string()));
    }

    for (idx, question) in payload.iter().enumerate() {
        if let Err(validation_errors) = question.validate() {
            return Err(AppError::BadRequest(format!(
                "Question {}: {}",
                idx + 1,
                validation_errors
            )));
        }
        if question.question_type == TYPE_QCM
            && (question.choices.is_none() || question.answer.is_none())
        {
            return Err(AppError::BadRequest(format!(
                "Question {}: QCM questions require choices and an answer",
                idx + 1
            )));
        }
    }

    let count = payload.len();
    let mut tx = pool.begin().await?;

    for question in payload {
        let choices_json = question
            .choices
            .map(|c| serde_json::to_string(&c))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO questions (document_id, question_type, question, choices, answer, explanation)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(document.id)
        .bind(&question.question_type)
        .bind(&question.question)
        .bind(choices_json)
        .bind(&question.answer)
        .bind(&question.explanation)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "created": count })),
    ))
}

/// Lists a document's question bank, answers included (owner view).
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(document_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = fetch_owned_document(&pool, document_id, claims.user_id()).await?;

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, document_id, question_type, question, choices, answer, explanation
        FROM questions
        WHERE document_id = ?
        ORDER BY id
        "#,
    )
    .bind(document.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}
