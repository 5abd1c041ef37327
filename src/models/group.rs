// src/models/group.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'groups' table in the database.
/// The owner is fixed at creation and is an implicit member: membership
/// checks must treat the owner as a member even though no group_members
/// row exists for them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Globally unique join code, 8 uppercase alphanumeric characters.
    pub invite_code: String,

    pub owner_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Group list item with membership counts.
#[derive(Debug, Serialize, FromRow)]
pub struct GroupSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub invite_code: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub member_count: i64,
    pub subject_count: i64,
}

/// One entry of a group's member list. `joined_at` is NULL for the owner,
/// who has no membership row.
#[derive(Debug, Serialize, FromRow)]
pub struct MemberEntry {
    pub user_id: i64,
    pub username: String,
    pub joined_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name is required."))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// DTO for joining a group by invite code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinGroupRequest {
    #[validate(length(min = 1, max = 16, message = "Invite code is required."))]
    pub invite_code: String,
}

/// DTO for linking a subject to a group.
#[derive(Debug, Deserialize)]
pub struct AddSubjectRequest {
    pub subject_id: i64,
}
