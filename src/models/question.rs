// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Multiple-choice question type. Only this type is auto-scored.
pub const TYPE_QCM: &str = "qcm";

/// Free-text question type; stored but never auto-scored.
pub const TYPE_OPEN: &str = "open";

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub document_id: i64,

    /// Question type: 'qcm' (multiple choice) or 'open' (free text).
    pub question_type: String,

    /// The text content of the question.
    pub question: String,

    /// List of choices (e.g., ["Paris", "Lyon"]).
    /// Stored as a JSON array; NULL for open questions.
    pub choices: Option<Json<Vec<String>>>,

    /// The correct answer; NULL for open questions without a reference answer.
    pub answer: Option<String>,

    /// Explanation of the correct answer.
    pub explanation: Option<String>,
}

/// DTO for sending a question to a player (excludes answer and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub question: String,
    pub choices: Option<Json<Vec<String>>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            question: q.question,
            choices: q.choices,
        }
    }
}

/// DTO for ingesting a generated question into the bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(custom(function = validate_question_type))]
    pub question_type: String,
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(custom(function = validate_choices))]
    pub choices: Option<Vec<String>>,
    #[validate(length(max = 500))]
    pub answer: Option<String>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

fn validate_question_type(question_type: &str) -> Result<(), validator::ValidationError> {
    if question_type != TYPE_QCM && question_type != TYPE_OPEN {
        return Err(validator::ValidationError::new("unknown_question_type"));
    }
    Ok(())
}

fn validate_choices(choices: &Vec<String>) -> Result<(), validator::ValidationError> {
    if choices.is_empty() {
        return Err(validator::ValidationError::new("choices_cannot_be_empty"));
    }
    for choice in choices {
        if choice.len() > 500 {
            return Err(validator::ValidationError::new("choice_too_long"));
        }
    }
    Ok(())
}
