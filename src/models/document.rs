// src/models/document.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'documents' table in the database.
/// Content is plain text; upload and text extraction happen upstream.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Document list item (content omitted).
#[derive(Debug, Serialize, FromRow)]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
    pub subject_id: Option<i64>,
    pub question_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for storing a new document.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required."))]
    pub title: String,
    #[validate(length(min = 1, message = "Content must not be empty."))]
    pub content: String,
    pub subject_id: Option<i64>,
}
