// src/handlers/events.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::SqlitePool;
use std::collections::HashMap;
use validator::Validate;

use crate::{
    config::{QUESTIONS_PER_QUIZ, QUIZZES_PER_EVENT, REQUIRED_QUESTIONS},
    error::AppError,
    handlers::groups::{fetch_group, require_member, require_owner},
    models::{
        event::{CreateEventRequest, Event, EventQuiz, EventStatus, partition_questions},
        participation::{EventParticipation, SubmitQuizRequest, grade},
        question::{PublicQuestion, Question, TYPE_QCM},
        ranking::{RankingRow, compute_ranking, compute_stats},
    },
    utils::jwt::Claims,
};

// ---- small data-access helpers ----

async fn fetch_event(pool: &SqlitePool, event_id: i64) -> Result<Event, AppError> {
    sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Event not found".to_string()))
}

async fn fetch_quiz(
    pool: &SqlitePool,
    event_id: i64,
    quiz_number: i64,
) -> Result<EventQuiz, AppError> {
    sqlx::query_as::<_, EventQuiz>(
        r#"
        SELECT id, event_id, quiz_number, questions
        FROM event_quizzes
        WHERE event_id = ? AND quiz_number = ?
        "#,
    )
    .bind(event_id)
    .bind(quiz_number)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Number of quizzes the user has completed for the event. The unlock rule
/// compares the requested quiz number against this count, which keeps every
/// member's completed numbers a gapless prefix of 1..5.
async fn completed_count(
    pool: &SqlitePool,
    event_id: i64,
    user_id: i64,
) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM event_participations WHERE event_id = ? AND user_id = ?",
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?)
}

async fn existing_participation_id(
    pool: &SqlitePool,
    quiz_id: i64,
    user_id: i64,
) -> Result<Option<i64>, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT id FROM event_participations WHERE quiz_id = ? AND user_id = ?",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

/// Loads the quiz's canonical question records, ordered as stored in the
/// quiz. Client-supplied data never decides correctness.
async fn load_quiz_questions(
    pool: &SqlitePool,
    quiz: &EventQuiz,
) -> Result<Vec<Question>, AppError> {
    // Dynamic IN clause over the quiz's fixed question-id list.
    let mut query_builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
        "SELECT id, document_id, question_type, question, choices, answer, explanation \
         FROM questions WHERE id IN (",
    );

    let mut separated = query_builder.separated(",");
    for qid in quiz.questions.iter() {
        separated.push_bind(*qid);
    }
    separated.push_unseparated(")");

    let mut by_id = HashMap::new();
    for question in query_builder
        .build_query_as::<Question>()
        .fetch_all(pool)
        .await?
    {
        by_id.insert(question.id, question);
    }

    Ok(quiz
        .questions
        .iter()
        .filter_map(|qid| by_id.remove(qid))
        .collect())
}

/// Every check the play endpoint runs. Submission re-runs the same chain
/// because state may have moved since play time (the event may have ended,
/// or a second tab may have submitted first).
async fn check_playable(
    pool: &SqlitePool,
    event: &Event,
    quiz_number: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<EventQuiz, AppError> {
    match event.status(now) {
        EventStatus::Future => {
            return Err(AppError::EventNotActive(
                "This event has not started yet".to_string(),
            ));
        }
        EventStatus::Ended => {
            return Err(AppError::EventNotActive(
                "This event has ended".to_string(),
            ));
        }
        EventStatus::Active => {}
    }

    if quiz_number < 1 || quiz_number > QUIZZES_PER_EVENT {
        return Err(AppError::BadRequest(format!(
            "Quiz number must be between 1 and {}",
            QUIZZES_PER_EVENT
        )));
    }

    let quiz = fetch_quiz(pool, event.id, quiz_number).await?;

    if let Some(participation_id) = existing_participation_id(pool, quiz.id, user_id).await? {
        return Err(AppError::AlreadyCompleted {
            event_id: event.id,
            participation_id,
        });
    }

    let completed = completed_count(pool, event.id, user_id).await?;
    let expected = completed + 1;
    if quiz_number != expected {
        return Err(AppError::QuizLocked { expected });
    }

    Ok(quiz)
}

// ---- handlers ----

/// Creates an event for a group and partitions the subject's question bank
/// into its quizzes, all inside one transaction: either the event and all
/// five quizzes are persisted, or nothing is.
pub async fn create_event(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let group = fetch_group(&pool, group_id).await?;
    require_owner(&group, claims.user_id())?;

    let start_date = parse_date(&payload.start_date)?;
    let end_date = parse_date(&payload.end_date)?;
    if end_date <= start_date {
        return Err(AppError::BadRequest(
            "End date must be after start date".to_string(),
        ));
    }

    let linked = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_subjects WHERE group_id = ? AND subject_id = ?",
    )
    .bind(group.id)
    .bind(payload.subject_id)
    .fetch_one(&pool)
    .await?;

    if linked == 0 {
        return Err(AppError::BadRequest(
            "The selected subject is not linked to this group".to_string(),
        ));
    }

    // Eligible pool: every QCM question attached to the subject's documents.
    let question_ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT q.id
        FROM questions q
        JOIN documents d ON d.id = q.document_id
        WHERE d.subject_id = ? AND q.question_type = ?
        "#,
    )
    .bind(payload.subject_id)
    .bind(TYPE_QCM)
    .fetch_all(&pool)
    .await?;

    let available = question_ids.len() as i64;
    if available < REQUIRED_QUESTIONS {
        return Err(AppError::InsufficientQuestions {
            available,
            required: REQUIRED_QUESTIONS,
        });
    }

    let chunks = partition_questions(question_ids, &mut StdRng::from_entropy());

    let mut tx = pool.begin().await?;

    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (name, description, group_id, subject_id, start_date, end_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, name, description, group_id, subject_id, start_date, end_date, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(group.id)
    .bind(payload.subject_id)
    .bind(start_date)
    .bind(end_date)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for (idx, chunk) in chunks.iter().enumerate() {
        sqlx::query("INSERT INTO event_quizzes (event_id, quiz_number, questions) VALUES (?, ?, ?)")
            .bind(event.id)
            .bind(idx as i64 + 1)
            .bind(serde_json::to_string(chunk)?)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Created event '{}' ({} quizzes x {} questions) for group {}",
        event.name,
        QUIZZES_PER_EVENT,
        QUESTIONS_PER_QUIZ,
        group.id
    );

    Ok((StatusCode::CREATED, Json(event)))
}

/// Lists a group's events with derived status, the caller's progress and
/// the distinct participant count. Member-only.
pub async fn list_events(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = fetch_group(&pool, group_id).await?;
    let user_id = claims.user_id();
    require_member(&pool, &group, user_id).await?;

    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, name, description, group_id, subject_id, start_date, end_date, created_at
        FROM events
        WHERE group_id = ?
        ORDER BY start_date DESC
        "#,
    )
    .bind(group.id)
    .fetch_all(&pool)
    .await?;

    let now = Utc::now();
    let mut enriched = Vec::with_capacity(events.len());
    for event in events {
        let completed = completed_count(&pool, event.id, user_id).await?;
        let participants = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT user_id) FROM event_participations WHERE event_id = ?",
        )
        .bind(event.id)
        .fetch_one(&pool)
        .await?;

        let status = event.status(now);
        let next_quiz = if completed < QUIZZES_PER_EVENT {
            Some(completed + 1)
        } else {
            None
        };

        enriched.push(serde_json::json!({
            "event": event,
            "status": status,
            "completed_quizzes": completed,
            "total_quizzes": QUIZZES_PER_EVENT,
            "next_quiz": next_quiz,
            "participants": participants,
            "can_play": status == EventStatus::Active && next_quiz.is_some(),
        }));
    }

    Ok(Json(enriched))
}

/// Event detail: derived status, the caller's progress, the leaderboard
/// and event-wide stats. Both are recomputed from participations on every
/// request, never cached.
pub async fn event_detail(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let event = fetch_event(&pool, event_id).await?;
    let group = fetch_group(&pool, event.group_id).await?;
    let user_id = claims.user_id();
    require_member(&pool, &group, user_id).await?;

    let rows = sqlx::query_as::<_, RankingRow>(
        r#"
        SELECT
            p.user_id,
            u.username,
            SUM(p.correct_count) AS total_correct,
            SUM(p.total_questions) AS total_questions,
            COUNT(p.id) AS quiz_count
        FROM event_participations p
        JOIN users u ON u.id = p.user_id
        WHERE p.event_id = ?
        GROUP BY p.user_id, u.username
        "#,
    )
    .bind(event.id)
    .fetch_all(&pool)
    .await?;

    let ranking = compute_ranking(rows);
    let stats = compute_stats(&ranking);

    let completed = completed_count(&pool, event.id, user_id).await?;
    let next_quiz = if completed < QUIZZES_PER_EVENT {
        Some(completed + 1)
    } else {
        None
    };
    let my_total: i64 = ranking
        .iter()
        .find(|r| r.user_id == user_id)
        .map(|r| r.total_correct)
        .unwrap_or(0);

    let status = event.status(Utc::now());

    Ok(Json(serde_json::json!({
        "event": event,
        "status": status,
        "progress": {
            "completed_quizzes": completed,
            "total_quizzes": QUIZZES_PER_EVENT,
            "next_quiz": next_quiz,
            "total_correct": my_total,
            "can_play": status == EventStatus::Active && next_quiz.is_some(),
        },
        "ranking": ranking,
        "stats": stats,
    })))
}

/// Deletes an event. Owner only, allowed in any state; existing
/// participations cascade and their count is reported back.
pub async fn delete_event(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let event = fetch_event(&pool, event_id).await?;
    let group = fetch_group(&pool, event.group_id).await?;
    require_owner(&group, claims.user_id())?;

    let participations = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM event_participations WHERE event_id = ?",
    )
    .bind(event.id)
    .fetch_one(&pool)
    .await?;

    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event.id)
        .execute(&pool)
        .await?;

    if participations > 0 {
        tracing::warn!(
            "Deleted event '{}' along with {} participation(s)",
            event.name,
            participations
        );
    }

    Ok(Json(serde_json::json!({
        "deleted": event.id,
        "removed_participations": participations,
    })))
}

/// Serves quiz `n` of an event for playing: membership, active window,
/// completion and sequential-unlock checks, then the questions in their
/// fixed order, stripped of answers and explanations.
pub async fn play_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((event_id, quiz_number)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let event = fetch_event(&pool, event_id).await?;
    let group = fetch_group(&pool, event.group_id).await?;
    let user_id = claims.user_id();
    require_member(&pool, &group, user_id).await?;

    let quiz = check_playable(&pool, &event, quiz_number, user_id, Utc::now()).await?;

    let questions: Vec<PublicQuestion> = load_quiz_questions(&pool, &quiz)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(serde_json::json!({
        "event_id": event.id,
        "quiz_number": quiz.quiz_number,
        "questions": questions,
    })))
}

/// Grades and records a quiz submission. Every play-time precondition is
/// re-validated here, then the canonical questions are reloaded and graded
/// server-side. The participation row is immutable once written; the
/// UNIQUE (quiz_id, user_id) index turns a lost duplicate-submission race
/// into an AlreadyCompleted error instead of a second row.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((event_id, quiz_number)): Path<(i64, i64)>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = fetch_event(&pool, event_id).await?;
    let group = fetch_group(&pool, event.group_id).await?;
    let user_id = claims.user_id();
    require_member(&pool, &group, user_id).await?;

    let quiz = check_playable(&pool, &event, quiz_number, user_id, Utc::now()).await?;

    let questions = load_quiz_questions(&pool, &quiz).await?;
    let by_id: HashMap<i64, Question> = questions.into_iter().map(|q| (q.id, q)).collect();

    let (correct, details) = grade(&quiz.questions, &by_id, &payload.answers);
    let total = details.len() as i64;

    let participation_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO event_participations
            (event_id, quiz_id, user_id, correct_count, total_questions, time_spent, answers, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(event.id)
    .bind(quiz.id)
    .bind(user_id)
    .bind(correct)
    .bind(total)
    .bind(payload.time_spent.max(0))
    .bind(serde_json::to_string(&details)?)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await;

    let participation_id = match participation_id {
        Ok(id) => id,
        Err(e) => {
            // A concurrent duplicate got there first.
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                let existing = existing_participation_id(&pool, quiz.id, user_id)
                    .await?
                    .ok_or_else(|| AppError::InternalServerError(e.to_string()))?;
                return Err(AppError::AlreadyCompleted {
                    event_id: event.id,
                    participation_id: existing,
                });
            }
            return Err(AppError::from(e));
        }
    };

    Ok(Json(serde_json::json!({
        "correct_count": correct,
        "total": total,
        "redirect_url": format!("/api/events/{}/participations/{}", event.id, participation_id),
    })))
}

/// Returns one of the caller's own results, audit trail included, plus the
/// next quiz to play.
pub async fn quiz_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((event_id, participation_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let participation = sqlx::query_as::<_, EventParticipation>(
        r#"
        SELECT id, event_id, quiz_id, user_id, correct_count, total_questions,
               time_spent, answers, completed_at
        FROM event_participations
        WHERE id = ? AND event_id = ?
        "#,
    )
    .bind(participation_id)
    .bind(event_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    if participation.user_id != user_id {
        return Err(AppError::NotFound("Result not found".to_string()));
    }

    let quiz_number = sqlx::query_scalar::<_, i64>(
        "SELECT quiz_number FROM event_quizzes WHERE id = ?",
    )
    .bind(participation.quiz_id)
    .fetch_one(&pool)
    .await?;

    let completed = completed_count(&pool, event_id, user_id).await?;
    let next_quiz = if completed < QUIZZES_PER_EVENT {
        Some(completed + 1)
    } else {
        None
    };

    Ok(Json(serde_json::json!({
        "participation": participation,
        "quiz_number": quiz_number,
        "next_quiz": next_quiz,
    })))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::BadRequest(format!("Invalid date format: '{}'", raw)))
}
