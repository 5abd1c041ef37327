// src/models/participation.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use std::collections::HashMap;

use crate::models::question::{Question, TYPE_QCM};

/// Represents the 'event_participations' table: one member's completed
/// attempt at one event quiz. Never mutated after insertion; a UNIQUE
/// (quiz_id, user_id) index rejects duplicate attempts at the storage layer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventParticipation {
    pub id: i64,
    pub event_id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub correct_count: i64,
    pub total_questions: i64,

    /// Seconds the member spent on the quiz, as reported by the client.
    pub time_spent: i64,

    /// Per-question audit trail of the graded submission.
    pub answers: Json<Vec<AnswerDetail>>,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// One graded answer in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub question_id: i64,
    pub user_answer: String,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    /// User's answers map. Key: question ID, Value: submitted answer text.
    pub answers: HashMap<i64, String>,

    /// Elapsed seconds; defaults to 0 when the client omits it.
    #[serde(default)]
    pub time_spent: i64,
}

/// Whether a submitted answer matches the stored one: whitespace-trimmed,
/// case-insensitive string equality.
pub fn answer_matches(submitted: &str, correct: &str) -> bool {
    submitted.trim().to_lowercase() == correct.trim().to_lowercase()
}

/// Grades a submission against the canonical question records, in the
/// quiz's stored question order. Only QCM questions with a stored answer
/// can score; everything else is recorded as incorrect in the audit trail.
/// Returns the correct count and the full per-question trail.
pub fn grade(
    ordered_ids: &[i64],
    questions: &HashMap<i64, Question>,
    answers: &HashMap<i64, String>,
) -> (i64, Vec<AnswerDetail>) {
    let mut correct_count = 0;
    let mut details = Vec::with_capacity(ordered_ids.len());

    for qid in ordered_ids {
        let Some(question) = questions.get(qid) else {
            continue;
        };

        let user_answer = answers.get(qid).cloned().unwrap_or_default();

        let is_correct = question.question_type == TYPE_QCM
            && question
                .answer
                .as_deref()
                .is_some_and(|correct| answer_matches(&user_answer, correct));

        if is_correct {
            correct_count += 1;
        }

        details.push(AnswerDetail {
            question_id: *qid,
            user_answer,
            correct_answer: question.answer.clone(),
            is_correct,
        });
    }

    (correct_count, details)
}
