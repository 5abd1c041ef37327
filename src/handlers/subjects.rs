// src/handlers/subjects.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        event::{Event, split_by_status},
        subject::{CreateSubjectRequest, Subject, SubjectSummary, UpdateSubjectRequest, random_color},
    },
    utils::jwt::Claims,
};

/// Lists the caller's subjects with their document counts.
pub async fn list_subjects(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, SubjectSummary>(
        r#"
        SELECT
            s.id, s.name, s.color, s.created_at,
            (SELECT COUNT(*) FROM documents d WHERE d.subject_id = s.id) AS document_count
        FROM subjects s
        WHERE s.user_id = ?
        ORDER BY s.name
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}

/// Creates a subject. Duplicate names (case-insensitive, per user) are
/// rejected with a 409 pointing at the existing subject.
pub async fn create_subject(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let name = payload.name.trim().to_string();
    let user_id = claims.user_id();

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM subjects WHERE user_id = ? AND LOWER(name) = LOWER(?)",
    )
    .bind(user_id)
    .bind(&name)
    .fetch_optional(&pool)
    .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Subject '{}' already exists",
            name
        )));
    }

    let color = payload.color.unwrap_or_else(random_color);

    let subject = sqlx::query_as::<_, Subject>(
        r#"
        INSERT INTO subjects (name, color, user_id, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, name, color, user_id, created_at
        "#,
    )
    .bind(&name)
    .bind(&color)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create subject: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(subject)))
}

/// Updates a subject's name or color.
pub async fn update_subject(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subject = fetch_owned_subject(&pool, id, claims.user_id()).await?;

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or(subject.name);
    let color = payload.color.unwrap_or(subject.color);

    // Renaming must respect the same per-user uniqueness as creation.
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM subjects WHERE user_id = ? AND LOWER(name) = LOWER(?) AND id != ?",
    )
    .bind(claims.user_id())
    .bind(&name)
    .bind(subject.id)
    .fetch_optional(&pool)
    .await?;

    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Subject '{}' already exists",
            name
        )));
    }

    sqlx::query("UPDATE subjects SET name = ?, color = ? WHERE id = ?")
        .bind(&name)
        .bind(&color)
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::OK)
}

/// Deletes a subject. Refused while it still holds documents, while a
/// future/active event references it, or while it is linked to a group.
/// Ended events impose no restriction.
pub async fn delete_subject(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let subject = fetch_owned_subject(&pool, id, claims.user_id()).await?;

    let doc_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM documents WHERE subject_id = ?",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    if doc_count > 0 {
        return Err(AppError::Conflict(format!(
            "Subject still contains {} document(s); move or delete them first",
            doc_count
        )));
    }

    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE subject_id = ?
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let (active, future) = split_by_status(&events, Utc::now());

    if !active.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete subject: {} active event(s) use it",
                active.len()
            ),
            events: active.iter().map(|e| e.name.clone()).collect(),
        });
    }

    if !future.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete subject: {} upcoming event(s) use it; delete those events first",
                future.len()
            ),
            events: future.iter().map(|e| e.name.clone()).collect(),
        });
    }

    let group_links =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM group_subjects WHERE subject_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await?;

    if group_links > 0 {
        return Err(AppError::Conflict(format!(
            "Subject is linked to {} group(s); remove it from them first",
            group_links
        )));
    }

    sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(subject.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_owned_subject(
    pool: &SqlitePool,
    subject_id: i64,
    user_id: i64,
) -> Result<Subject, AppError> {
    sqlx::query_as::<_, Subject>(
        "SELECT id, name, color, user_id, created_at FROM subjects WHERE id = ? AND user_id = ?",
    )
    .bind(subject_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Subject not found".to_string()))
}
