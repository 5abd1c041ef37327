// tests/event_flow_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::{
    create_event, create_group_with_subject, join_group, play_and_submit, register_and_login,
    seed_question_bank, spawn_app,
};
use std::collections::HashSet;

#[tokio::test]
async fn creating_an_event_partitions_the_bank_into_five_disjoint_quizzes() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 100).await;
    let (group_id, _) = create_group_with_subject(&client, &address, &owner, subject_id).await;

    let now = Utc::now();
    let resp = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 201);
    let event: serde_json::Value = resp.json().await.unwrap();
    let event_id = event["id"].as_i64().unwrap();

    let quizzes: Vec<(i64, String)> = sqlx::query_as(
        "SELECT quiz_number, questions FROM event_quizzes WHERE event_id = ? ORDER BY quiz_number",
    )
    .bind(event_id)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(quizzes.len(), 5);
    let mut seen = HashSet::new();
    for (idx, (quiz_number, questions)) in quizzes.iter().enumerate() {
        assert_eq!(*quiz_number, idx as i64 + 1);
        let ids: Vec<i64> = serde_json::from_str(questions).unwrap();
        assert_eq!(ids.len(), 20);
        for id in ids {
            assert!(seen.insert(id), "question {} assigned to two quizzes", id);
        }
    }
    assert_eq!(seen.len(), 100);
}

#[tokio::test]
async fn event_creation_fails_atomically_when_the_bank_is_too_small() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 80).await;
    let (group_id, _) = create_group_with_subject(&client, &address, &owner, subject_id).await;

    let now = Utc::now();
    let resp = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["available"], 80);
    assert_eq!(body["required"], 100);

    // Nothing was persisted.
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(events, 0);
    let quizzes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_quizzes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(quizzes, 0);
}

#[tokio::test]
async fn quizzes_unlock_sequentially_and_submissions_are_final() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 100).await;
    let (group_id, invite_code) =
        create_group_with_subject(&client, &address, &owner, subject_id).await;

    let member = register_and_login(&client, &address, "bob").await;
    join_group(&client, &address, &member, &invite_code).await;

    let now = Utc::now();
    let event: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await
    .json()
    .await
    .unwrap();
    let event_id = event["id"].as_i64().unwrap();

    // Quiz 2 is locked until quiz 1 is done.
    let resp = client
        .get(format!("{}/api/events/{}/quizzes/2", address, event_id))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["expected_quiz"], 1);

    // Grading is whitespace- and case-insensitive.
    let resp = play_and_submit(&client, &address, &member, event_id, 1, "  PARIS  ").await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["correct_count"], 20);
    assert_eq!(body["total"], 20);
    let result_url = body["redirect_url"].as_str().unwrap().to_string();

    // The result endpoint shows the audit trail and the next quiz.
    let result: serde_json::Value = client
        .get(format!("{}{}", address, result_url))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["quiz_number"], 1);
    assert_eq!(result["next_quiz"], 2);
    assert_eq!(result["participation"]["correct_count"], 20);

    // Skipping ahead to quiz 3 is refused; 2 is the one to play.
    let resp = client
        .get(format!("{}/api/events/{}/quizzes/3", address, event_id))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["expected_quiz"], 2);

    // Re-submitting quiz 1 is refused and points at the existing result.
    let resp = client
        .post(format!(
            "{}/api/events/{}/quizzes/1/submit",
            address, event_id
        ))
        .bearer_auth(&member)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["redirect_url"].as_str().unwrap(), result_url);

    // The rejected duplicate left no second row behind.
    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM event_participations WHERE event_id = ?",
    )
    .bind(event_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn ranking_aggregates_scores_and_breaks_ties_deterministically() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 100).await;
    let (group_id, invite_code) =
        create_group_with_subject(&client, &address, &owner, subject_id).await;

    let member = register_and_login(&client, &address, "bob").await;
    join_group(&client, &address, &member, &invite_code).await;

    let now = Utc::now();
    let event: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await
    .json()
    .await
    .unwrap();
    let event_id = event["id"].as_i64().unwrap();

    // bob: 20 then 0 over two quizzes; alice: 0 over one quiz.
    let resp = play_and_submit(&client, &address, &member, event_id, 1, "paris").await;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = play_and_submit(&client, &address, &member, event_id, 2, "lyon").await;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = play_and_submit(&client, &address, &owner, event_id, 1, "lyon").await;
    assert_eq!(resp.status().as_u16(), 200);

    let detail: serde_json::Value = client
        .get(format!("{}/api/events/{}", address, event_id))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ranking = detail["ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0]["username"], "bob");
    assert_eq!(ranking[0]["rank"], 1);
    assert_eq!(ranking[0]["total_correct"], 20);
    assert_eq!(ranking[0]["quiz_count"], 2);
    assert_eq!(ranking[1]["username"], "alice");
    assert_eq!(ranking[1]["rank"], 2);
    assert_eq!(ranking[1]["total_correct"], 0);

    assert_eq!(detail["stats"]["total_participants"], 2);
    assert_eq!(detail["stats"]["total_completions"], 3);
    assert_eq!(detail["progress"]["completed_quizzes"], 2);
    assert_eq!(detail["progress"]["next_quiz"], 3);
    assert_eq!(detail["progress"]["total_correct"], 20);
    assert_eq!(detail["status"], "active");
}

#[tokio::test]
async fn playing_is_limited_to_the_event_window_and_to_members() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 100).await;
    let (group_id, _) = create_group_with_subject(&client, &address, &owner, subject_id).await;

    let now = Utc::now();

    // Future event: visible but not playable.
    let future: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now + Duration::hours(1),
        now + Duration::hours(2),
    )
    .await
    .json()
    .await
    .unwrap();
    let resp = client
        .get(format!(
            "{}/api/events/{}/quizzes/1",
            address,
            future["id"].as_i64().unwrap()
        ))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Ended event: results only, no more play.
    let ended: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(2),
        now - Duration::hours(1),
    )
    .await
    .json()
    .await
    .unwrap();
    let resp = client
        .post(format!(
            "{}/api/events/{}/quizzes/1/submit",
            address,
            ended["id"].as_i64().unwrap()
        ))
        .bearer_auth(&owner)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Active event, but the caller is not in the group.
    let active: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await
    .json()
    .await
    .unwrap();
    let outsider = register_and_login(&client, &address, "carol").await;
    let resp = client
        .get(format!(
            "{}/api/events/{}/quizzes/1",
            address,
            active["id"].as_i64().unwrap()
        ))
        .bearer_auth(&outsider)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn event_list_reports_status_and_progress_per_member() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &address, "alice").await;
    let (subject_id, _) = seed_question_bank(&client, &address, &owner, 100).await;
    let (group_id, _) = create_group_with_subject(&client, &address, &owner, subject_id).await;

    let now = Utc::now();
    let event: serde_json::Value = create_event(
        &client,
        &address,
        &owner,
        group_id,
        subject_id,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await
    .json()
    .await
    .unwrap();
    let event_id = event["id"].as_i64().unwrap();

    let resp = play_and_submit(&client, &address, &owner, event_id, 1, "paris").await;
    assert_eq!(resp.status().as_u16(), 200);

    let list: serde_json::Value = client
        .get(format!("{}/api/groups/{}/events", address, group_id))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = list.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "active");
    assert_eq!(entries[0]["completed_quizzes"], 1);
    assert_eq!(entries[0]["next_quiz"], 2);
    assert_eq!(entries[0]["participants"], 1);
    assert_eq!(entries[0]["can_play"], true);
}
