// src/models/ranking.rs

use serde::Serialize;
use sqlx::FromRow;

/// Raw per-user aggregate as it comes out of the GROUP BY query.
#[derive(Debug, Clone, FromRow)]
pub struct RankingRow {
    pub user_id: i64,
    pub username: String,
    pub total_correct: i64,
    pub total_questions: i64,
    pub quiz_count: i64,
}

/// One leaderboard entry after ordering and rank assignment.
#[derive(Debug, Serialize, PartialEq)]
pub struct RankingEntry {
    pub rank: i64,
    pub user_id: i64,
    pub username: String,
    pub total_correct: i64,
    pub total_questions: i64,
    pub quiz_count: i64,
}

/// Event-wide statistics, recomputed fresh on every view.
#[derive(Debug, Serialize)]
pub struct EventStats {
    pub total_participants: i64,
    pub total_completions: i64,
    pub avg_correct: f64,
    pub avg_questions: f64,
}

/// Orders aggregates by total correct answers, descending. Ties are broken
/// by ascending user id so the order is deterministic, then ranks 1..n are
/// assigned in sequence.
pub fn compute_ranking(mut rows: Vec<RankingRow>) -> Vec<RankingEntry> {
    rows.sort_by(|a, b| {
        b.total_correct
            .cmp(&a.total_correct)
            .then(a.user_id.cmp(&b.user_id))
    });

    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| RankingEntry {
            rank: idx as i64 + 1,
            user_id: row.user_id,
            username: row.username,
            total_correct: row.total_correct,
            total_questions: row.total_questions,
            quiz_count: row.quiz_count,
        })
        .collect()
}

/// Derives event-wide stats from the ranked entries.
pub fn compute_stats(ranking: &[RankingEntry]) -> EventStats {
    let total_participants = ranking.len() as i64;
    let total_completions: i64 = ranking.iter().map(|r| r.quiz_count).sum();

    let (avg_correct, avg_questions) = if total_participants > 0 {
        let correct_sum: i64 = ranking.iter().map(|r| r.total_correct).sum();
        let question_sum: i64 = ranking.iter().map(|r| r.total_questions).sum();
        (
            correct_sum as f64 / total_participants as f64,
            question_sum as f64 / total_participants as f64,
        )
    } else {
        (0.0, 0.0)
    };

    EventStats {
        total_participants,
        total_completions,
        avg_correct,
        avg_questions,
    }
}
