// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed input, failed validation)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (non-owner / non-member)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username, duplicate group join)
    Conflict(String),

    /// The subject's question bank is below the size an event needs.
    InsufficientQuestions { available: i64, required: i64 },

    /// A quiz was attempted out of order; `expected` is the one to play next.
    QuizLocked { expected: i64 },

    /// The quiz was already completed; points at the existing result.
    AlreadyCompleted {
        event_id: i64,
        participation_id: i64,
    },

    /// The event's time window does not allow the action.
    EventNotActive(String),

    /// Deletion refused because future/active events still reference the data.
    DeletionBlocked {
        message: String,
        events: Vec<String>,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
/// Structured variants carry their details as extra JSON fields so clients
/// can act on them (expected quiz number, prior result link, blocking events).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::InsufficientQuestions {
                available,
                required,
            } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!(
                        "Cannot create event: the subject has {} question(s) but {} are required",
                        available, required
                    ),
                    "available": available,
                    "required": required,
                }),
            ),
            AppError::QuizLocked { expected } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": format!("You must complete quiz {} first", expected),
                    "expected_quiz": expected,
                }),
            ),
            AppError::AlreadyCompleted {
                event_id,
                participation_id,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Quiz already completed",
                    "redirect_url": format!(
                        "/api/events/{}/participations/{}",
                        event_id, participation_id
                    ),
                }),
            ),
            AppError::EventNotActive(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::DeletionBlocked { message, events } => (
                StatusCode::CONFLICT,
                json!({
                    "error": message,
                    "blocking_events": events,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
