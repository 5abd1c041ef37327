// src/handlers/documents.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        document::{CreateDocumentRequest, Document, DocumentSummary},
        event::{Event, EventQuiz, split_by_status},
    },
    utils::jwt::Claims,
};

/// Stores a new document. Upload and text extraction happen upstream;
/// this endpoint receives the already-extracted plain text.
pub async fn create_document(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(subject_id) = payload.subject_id {
        // The target subject must exist and belong to the caller.
        crate::handlers::subjects::fetch_owned_subject(&pool, subject_id, claims.user_id()).await?;
    }

    let document = sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents (title, content, user_id, subject_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, title, content, user_id, subject_id, created_at
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(claims.user_id())
    .bind(payload.subject_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store document: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// Lists the caller's documents with their question counts.
pub async fn list_documents(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let documents = sqlx::query_as::<_, DocumentSummary>(
        r#"
        SELECT
            d.id, d.title, d.subject_id, d.created_at,
            (SELECT COUNT(*) FROM questions q WHERE q.document_id = d.id) AS question_count
        FROM documents d
        WHERE d.user_id = ?
        ORDER BY d.created_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(documents))
}

/// Returns one of the caller's documents, content included.
pub async fn get_document(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = fetch_owned_document(&pool, id, claims.user_id()).await?;
    Ok(Json(document))
}

/// Deletes a document. Refused while any of its questions is assigned to a
/// quiz of a future or active event; ended events do not block. Questions
/// cascade with the document.
pub async fn delete_document(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = fetch_owned_document(&pool, id, claims.user_id()).await?;

    let blocking = events_referencing_document(&pool, &document).await?;
    let (active, future) = split_by_status(&blocking, Utc::now());

    if !active.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete document: its questions are used by {} active event(s)",
                active.len()
            ),
            events: active.iter().map(|e| e.name.clone()).collect(),
        });
    }

    if !future.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete document: its questions are used by {} upcoming event(s); delete those events first",
                future.len()
            ),
            events: future.iter().map(|e| e.name.clone()).collect(),
        });
    }

    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Collects the events whose quizzes reference any question of the
/// document. Only events on the document's subject can hold such
/// references, and only the ones created before a question was added
/// actually do, so each candidate's quiz lists are checked for overlap.
async fn events_referencing_document(
    pool: &SqlitePool,
    document: &Document,
) -> Result<Vec<Event>, AppError> {
    let Some(subject_id) = document.subject_id else {
        return Ok(Vec::new());
    };

    let question_ids: HashSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE document_id = ?")
            .bind(document.id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect();

    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE subject_id = ?
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    let mut referencing = Vec::new();
    for event in candidates {
        let quizzes = sqlx::query_as::<_, EventQuiz>(
            "SELECT id, event_id, quiz_number, questions FROM event_quizzes WHERE event_id = ?",
        )
        .bind(event.id)
        .fetch_all(pool)
        .await?;

        let overlaps = quizzes
            .iter()
            .flat_map(|quiz| quiz.questions.iter())
            .any(|qid| question_ids.contains(qid));

        if overlaps {
            referencing.push(event);
        }
    }

    Ok(referencing)
}

pub(crate) async fn fetch_owned_document(
    pool: &SqlitePool,
    document_id: i64,
    user_id: i64,
) -> Result<Document, AppError> {
    sqlx::query_as::<_, Document>(
        r#"
        SELECT id, title, content, user_id, subject_id, created_at
        FROM documents
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Document not found".to_string()))
}
