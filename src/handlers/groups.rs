// src/handlers/groups.rs

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
    handlers::subjects::fetch_owned_subject,
    models::{
        event::{Event, split_by_status},
        group::{AddSubjectRequest, CreateGroupRequest, Group, GroupSummary, JoinGroupRequest, MemberEntry},
    },
    utils::{invite::generate_invite_code, jwt::Claims},
};

// ---- shared authorization helpers ----

pub(crate) async fn fetch_group(pool: &SqlitePool, group_id: i64) -> Result<Group, AppError> {
    sqlx::query_as::<_, Group>(
        r#"
        SELECT id, name, description, invite_code, owner_id, created_at
        FROM groups
        WHERE id = ?
        "#,
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Group not found".to_string()))
}

/// The owner counts as a member without a membership row.
pub(crate) async fn is_member(
    pool: &SqlitePool,
    group: &Group,
    user_id: i64,
) -> Result<bool, AppError> {
    if group.owner_id == user_id {
        return Ok(true);
    }

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND user_id = ?",
    )
    .bind(group.id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

pub(crate) async fn require_member(
    pool: &SqlitePool,
    group: &Group,
    user_id: i64,
) -> Result<(), AppError> {
    if is_member(pool, group, user_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not a member of this group".to_string(),
        ))
    }
}

pub(crate) fn require_owner(group: &Group, user_id: i64) -> Result<(), AppError> {
    if group.owner_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the group owner can do this".to_string(),
        ))
    }
}

async fn group_events(pool: &SqlitePool, group_id: i64) -> Result<Vec<Event>, AppError> {
    Ok(sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE group_id = ?
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?)
}

// ---- handlers ----

/// Creates a group; the caller becomes its immutable owner. The invite
/// code is regenerated until it is free, collisions being astronomically
/// unlikely but cheap to retry.
pub async fn create_group(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut invite_code = generate_invite_code();
    loop {
        let taken =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM groups WHERE invite_code = ?")
                .bind(&invite_code)
                .fetch_one(&pool)
                .await?;
        if taken == 0 {
            break;
        }
        invite_code = generate_invite_code();
    }

    let group = sqlx::query_as::<_, Group>(
        r#"
        INSERT INTO groups (name, description, invite_code, owner_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, description, invite_code, owner_id, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(&invite_code)
    .bind(claims.user_id())
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create group: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// Lists the groups the caller owns or has joined.
pub async fn list_groups(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let groups = sqlx::query_as::<_, GroupSummary>(
        r#"
        SELECT
            g.id, g.name, g.description, g.invite_code, g.owner_id,
            u.username AS owner_username,
            (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count,
            (SELECT COUNT(*) FROM group_subjects gs WHERE gs.group_id = g.id) AS subject_count
        FROM groups g
        JOIN users u ON u.id = g.owner_id
        WHERE g.owner_id = ?
           OR g.id IN (SELECT group_id FROM group_members WHERE user_id = ?)
        ORDER BY g.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(groups))
}

/// Group detail: members (owner listed first, without a joined_at) and the
/// linked subjects with their document counts. Member-only.
pub async fn view_group(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    require_member(&pool, &group, claims.user_id()).await?;

    let owner = sqlx::query_as::<_, MemberEntry>(
        "SELECT id AS user_id, username, NULL AS joined_at FROM users WHERE id = ?",
    )
    .bind(group.owner_id)
    .fetch_one(&pool)
    .await?;

    let mut members = vec![owner];
    members.extend(
        sqlx::query_as::<_, MemberEntry>(
            r#"
            SELECT m.user_id, u.username, m.joined_at
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = ?
            ORDER BY m.joined_at
            "#,
        )
        .bind(group.id)
        .fetch_all(&pool)
        .await?,
    );

    let subjects = sqlx::query_as::<_, crate::models::subject::SubjectSummary>(
        r#"
        SELECT
            s.id, s.name, s.color, s.created_at,
            (SELECT COUNT(*) FROM documents d WHERE d.subject_id = s.id) AS document_count
        FROM subjects s
        JOIN group_subjects gs ON gs.subject_id = s.id
        WHERE gs.group_id = ?
        ORDER BY s.name
        "#,
    )
    .bind(group.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "group": group,
        "members": members,
        "subjects": subjects,
    })))
}

/// Deletes a group. Owner only. Blocked while the group has active events
/// (hard block) or future events (delete those first); ended events do not
/// block. Members, subject links, events, quizzes and participations all
/// cascade.
pub async fn delete_group(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    require_owner(&group, claims.user_id())?;

    let events = group_events(&pool, group.id).await?;
    let (active, future) = split_by_status(&events, Utc::now());

    if !active.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete group: {} event(s) currently running",
                active.len()
            ),
            events: active.iter().map(|e| e.name.clone()).collect(),
        });
    }

    if !future.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot delete group: {} upcoming event(s); delete those events first",
                future.len()
            ),
            events: future.iter().map(|e| e.name.clone()).collect(),
        });
    }

    sqlx::query("DELETE FROM groups WHERE id = ?")
        .bind(group.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Joins a group by invite code (case-insensitive).
pub async fn join_group(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = payload.invite_code.trim().to_uppercase();

    let group = sqlx::query_as::<_, Group>(
        r#"
        SELECT id, name, description, invite_code, owner_id, created_at
        FROM groups
        WHERE UPPER(invite_code) = ?
        "#,
    )
    .bind(&code)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Invalid invite code".to_string()))?;

    let user_id = claims.user_id();

    if is_member(&pool, &group, user_id).await? {
        return Err(AppError::Conflict(
            "You are already a member of this group".to_string(),
        ));
    }

    sqlx::query("INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)")
        .bind(group.id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::Conflict("You are already a member of this group".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "group_id": group.id, "name": group.name })),
    ))
}

/// Leaves a group. The owner cannot leave their own group (they must
/// delete it). Blocked while the member has participations in an active
/// event of the group; participations in future-only or ended events do
/// not block but are lost with the membership.
pub async fn leave_group(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    let user_id = claims.user_id();

    if group.owner_id == user_id {
        return Err(AppError::Forbidden(
            "The owner cannot leave their own group; delete it instead".to_string(),
        ));
    }

    let membership = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND user_id = ?",
    )
    .bind(group.id)
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    if membership == 0 {
        return Err(AppError::NotFound(
            "You are not a member of this group".to_string(),
        ));
    }

    let participated: Vec<Event> = sqlx::query_as::<_, Event>(
        r#"
        SELECT DISTINCT e.id, e.name, e.description, e.group_id, e.subject_id,
               e.start_date, e.end_date, e.created_at
        FROM events e
        JOIN event_participations p ON p.event_id = e.id
        WHERE e.group_id = ? AND p.user_id = ?
        "#,
    )
    .bind(group.id)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let (active, _future) = split_by_status(&participated, Utc::now());

    if !active.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot leave group: you are participating in {} running event(s); wait until they end",
                active.len()
            ),
            events: active.iter().map(|e| e.name.clone()).collect(),
        });
    }

    sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
        .bind(group.id)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Links one of the owner's subjects to the group.
pub async fn add_subject(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
    Json(payload): Json<AddSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    require_owner(&group, claims.user_id())?;

    let subject = fetch_owned_subject(&pool, payload.subject_id, claims.user_id()).await?;

    sqlx::query("INSERT INTO group_subjects (group_id, subject_id, added_at) VALUES (?, ?, ?)")
        .bind(group.id)
        .bind(subject.id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::Conflict("Subject is already linked to this group".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "group_id": group.id, "subject_id": subject.id })),
    ))
}

/// Unlinks a subject from the group. Blocked while a future or active
/// event of this group uses the subject.
pub async fn remove_subject(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((group_id, subject_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    require_owner(&group, claims.user_id())?;

    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE group_id = ? AND subject_id = ?
        "#,
    )
    .bind(group.id)
    .bind(subject_id)
    .fetch_all(&pool)
    .await?;

    let (active, future) = split_by_status(&events, Utc::now());

    if !active.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot remove subject: {} running event(s) use it",
                active.len()
            ),
            events: active.iter().map(|e| e.name.clone()).collect(),
        });
    }

    if !future.is_empty() {
        return Err(AppError::DeletionBlocked {
            message: format!(
                "Cannot remove subject: {} upcoming event(s) use it; delete those events first",
                future.len()
            ),
            events: future.iter().map(|e| e.name.clone()).collect(),
        });
    }

    let result = sqlx::query("DELETE FROM group_subjects WHERE group_id = ? AND subject_id = ?")
        .bind(group.id)
        .bind(subject_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Subject is not linked to this group".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}
