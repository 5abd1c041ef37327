// src/models/event.rs

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use std::fmt;
use validator::Validate;

use crate::config::{QUESTIONS_PER_QUIZ, QUIZZES_PER_EVENT};

/// Represents the 'events' table in the database.
/// An event is a timed competition scoped to one group and one subject.
/// Its status is never stored; it is derived from the timestamps on every read.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub group_id: i64,

    /// Subject the quizzes were drawn from. Becomes NULL when the subject
    /// is deleted after the event has ended; the quizzes and results stay.
    pub subject_id: Option<i64>,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Derived event status. Boundary policy: both bounds are inclusive, an
/// event is active at exactly `start_date` and at exactly `end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Future,
    Active,
    Ended,
}

impl EventStatus {
    pub fn at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            EventStatus::Future
        } else if now > end {
            EventStatus::Ended
        } else {
            EventStatus::Active
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Future => "future",
            EventStatus::Active => "active",
            EventStatus::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

impl Event {
    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        EventStatus::at(now, self.start_date, self.end_date)
    }
}

/// Splits events into (active, future) at `now`, dropping ended ones.
/// Used by the deletion guards: ended events never block anything.
pub fn split_by_status(events: &[Event], now: DateTime<Utc>) -> (Vec<&Event>, Vec<&Event>) {
    let mut active = Vec::new();
    let mut future = Vec::new();
    for event in events {
        match event.status(now) {
            EventStatus::Active => active.push(event),
            EventStatus::Future => future.push(event),
            EventStatus::Ended => {}
        }
    }
    (active, future)
}

/// Shuffles the eligible question ids with a uniform permutation and cuts
/// them into QUIZZES_PER_EVENT contiguous chunks of QUESTIONS_PER_QUIZ.
/// Callers must pass at least QUIZZES_PER_EVENT * QUESTIONS_PER_QUIZ ids;
/// any surplus beyond that is left out of the event.
pub fn partition_questions<R: Rng>(mut ids: Vec<i64>, rng: &mut R) -> Vec<Vec<i64>> {
    ids.shuffle(rng);
    ids.truncate((QUIZZES_PER_EVENT * QUESTIONS_PER_QUIZ) as usize);
    ids.chunks(QUESTIONS_PER_QUIZ as usize)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Represents the 'event_quizzes' table: one fixed, ordered 20-question
/// slice of the event's partition, numbered 1..5. Immutable after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventQuiz {
    pub id: i64,
    pub event_id: i64,
    pub quiz_number: i64,
    pub questions: Json<Vec<i64>>,
}

/// DTO for creating an event. Dates arrive as RFC3339 strings and are
/// parsed by the handler so a bad format surfaces as a validation error.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 120, message = "Event name is required."))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub subject_id: i64,
    pub start_date: String,
    pub end_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn ts(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn status_future_before_start() {
        let start = ts("2025-06-01 10:00:00");
        let end = ts("2025-06-02 10:00:00");
        let now = ts("2025-06-01 09:59:59");
        assert_eq!(EventStatus::at(now, start, end), EventStatus::Future);
    }

    #[test]
    fn status_active_at_both_bounds() {
        let start = ts("2025-06-01 10:00:00");
        let end = ts("2025-06-02 10:00:00");
        assert_eq!(EventStatus::at(start, start, end), EventStatus::Active);
        assert_eq!(EventStatus::at(end, start, end), EventStatus::Active);
        let mid = ts("2025-06-01 20:00:00");
        assert_eq!(EventStatus::at(mid, start, end), EventStatus::Active);
    }

    #[test]
    fn status_ended_after_end() {
        let start = ts("2025-06-01 10:00:00");
        let end = ts("2025-06-02 10:00:00");
        let now = ts("2025-06-02 10:00:01");
        assert_eq!(EventStatus::at(now, start, end), EventStatus::Ended);
    }

    #[test]
    fn partition_produces_disjoint_full_cover() {
        let ids: Vec<i64> = (1..=100).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let chunks = partition_questions(ids.clone(), &mut rng);

        assert_eq!(chunks.len(), QUIZZES_PER_EVENT as usize);
        for chunk in &chunks {
            assert_eq!(chunk.len(), QUESTIONS_PER_QUIZ as usize);
        }

        let union: HashSet<i64> = chunks.iter().flatten().copied().collect();
        assert_eq!(union.len(), 100, "chunks must be pairwise disjoint");
        assert_eq!(union, ids.into_iter().collect::<HashSet<i64>>());
    }

    #[test]
    fn partition_drops_surplus_questions() {
        let ids: Vec<i64> = (1..=130).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let chunks = partition_questions(ids, &mut rng);

        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, (QUIZZES_PER_EVENT * QUESTIONS_PER_QUIZ) as usize);

        let union: HashSet<i64> = chunks.iter().flatten().copied().collect();
        assert_eq!(union.len(), total);
    }

    #[test]
    fn partition_is_deterministic_for_a_seed() {
        let ids: Vec<i64> = (1..=100).collect();
        let a = partition_questions(ids.clone(), &mut StdRng::seed_from_u64(9));
        let b = partition_questions(ids, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn split_by_status_ignores_ended() {
        let mk = |id: i64, start: &str, end: &str| Event {
            id,
            name: format!("event-{}", id),
            description: None,
            group_id: 1,
            subject_id: Some(1),
            start_date: ts(start),
            end_date: ts(end),
            created_at: ts("2025-01-01 00:00:00"),
        };
        let events = vec![
            mk(1, "2025-06-01 00:00:00", "2025-06-03 00:00:00"), // active
            mk(2, "2025-06-05 00:00:00", "2025-06-06 00:00:00"), // future
            mk(3, "2025-05-01 00:00:00", "2025-05-02 00:00:00"), // ended
        ];
        let now = ts("2025-06-02 00:00:00");
        let (active, future) = split_by_status(&events, now);
        assert_eq!(active.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(future.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2]);
    }
}
