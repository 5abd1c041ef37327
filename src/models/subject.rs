// src/models/subject.rs

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Palette used when a subject is created without an explicit color.
pub const COLORS: &[&str] = &[
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
    "#6366F1", "#84CC16", "#06B6D4", "#D946EF",
];

/// Picks a random color from the palette.
pub fn random_color() -> String {
    COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("#3B82F6")
        .to_string()
}

/// Represents the 'subjects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub user_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Subject enriched with its document count, for list views.
#[derive(Debug, Serialize, FromRow)]
pub struct SubjectSummary {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub document_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 100, message = "Subject name is required."))]
    pub name: String,
    pub color: Option<String>,
}

/// DTO for updating a subject. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}
