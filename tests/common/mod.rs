// tests/common/mod.rs

use quizarena::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Spawns the app on a random port backed by a fresh in-memory database.
/// Returns the base URL and the pool for direct state assertions.
pub async fn spawn_app() -> (String, SqlitePool) {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Invalid sqlite URL")
        .foreign_keys(true);

    // A single connection keeps every request on the same in-memory DB.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a user and returns a bearer token.
pub async fn register_and_login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password,
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password,
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

/// Creates a subject, a document and `question_count` QCM questions whose
/// correct answer is always "paris". Returns (subject_id, document_id).
pub async fn seed_question_bank(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    question_count: usize,
) -> (i64, i64) {
    let subject: serde_json::Value = client
        .post(format!("{}/api/subjects", address))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": format!("Geography {}", question_count) }))
        .send()
        .await
        .expect("Create subject failed")
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().expect("subject id");

    let document: serde_json::Value = client
        .post(format!("{}/api/documents", address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "title": "Capitals",
            "content": "Course text about capitals of the world.",
            "subject_id": subject_id,
        }))
        .send()
        .await
        .expect("Create document failed")
        .json()
        .await
        .unwrap();
    let document_id = document["id"].as_i64().expect("document id");

    let questions: Vec<serde_json::Value> = (0..question_count)
        .map(|i| {
            serde_json::json!({
                "question_type": "qcm",
                "question": format!("Question {}", i),
                "choices": ["paris", "lyon", "nice", "brest"],
                "answer": "paris",
            })
        })
        .collect();

    let resp = client
        .post(format!("{}/api/documents/{}/questions", address, document_id))
        .bearer_auth(token)
        .json(&questions)
        .send()
        .await
        .expect("Create questions failed");
    assert_eq!(resp.status().as_u16(), 201);

    (subject_id, document_id)
}

/// Creates a group owned by `token`'s user and links the subject to it.
/// Returns (group_id, invite_code).
pub async fn create_group_with_subject(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    subject_id: i64,
) -> (i64, String) {
    let group: serde_json::Value = client
        .post(format!("{}/api/groups", address))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": "Test group" }))
        .send()
        .await
        .expect("Create group failed")
        .json()
        .await
        .unwrap();
    let group_id = group["id"].as_i64().expect("group id");
    let invite_code = group["invite_code"].as_str().expect("invite code").to_string();

    let resp = client
        .post(format!("{}/api/groups/{}/subjects", address, group_id))
        .bearer_auth(token)
        .json(&serde_json::json!({ "subject_id": subject_id }))
        .send()
        .await
        .expect("Link subject failed");
    assert_eq!(resp.status().as_u16(), 201);

    (group_id, invite_code)
}

/// Creates an event over the given window. Returns the raw response.
pub async fn create_event(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    group_id: i64,
    subject_id: i64,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> reqwest::Response {
    client
        .post(format!("{}/api/groups/{}/events", address, group_id))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "name": "Championship",
            "subject_id": subject_id,
            "start_date": start.to_rfc3339(),
            "end_date": end.to_rfc3339(),
        }))
        .send()
        .await
        .expect("Create event failed")
}

/// Joins a group by invite code.
pub async fn join_group(client: &reqwest::Client, address: &str, token: &str, invite_code: &str) {
    let resp = client
        .post(format!("{}/api/groups/join", address))
        .bearer_auth(token)
        .json(&serde_json::json!({ "invite_code": invite_code }))
        .send()
        .await
        .expect("Join group failed");
    assert_eq!(resp.status().as_u16(), 201);
}

/// Plays quiz `n` and submits the same answer for every question.
/// Returns the submit response.
pub async fn play_and_submit(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    event_id: i64,
    quiz_number: i64,
    answer: &str,
) -> reqwest::Response {
    let play: serde_json::Value = client
        .get(format!(
            "{}/api/events/{}/quizzes/{}",
            address, event_id, quiz_number
        ))
        .bearer_auth(token)
        .send()
        .await
        .expect("Play failed")
        .json()
        .await
        .expect("Play response not json");

    let questions = play["questions"].as_array().expect("questions array");
    let mut answers = serde_json::Map::new();
    for q in questions {
        let id = q["id"].as_i64().unwrap();
        answers.insert(id.to_string(), serde_json::json!(answer));
    }

    client
        .post(format!(
            "{}/api/events/{}/quizzes/{}/submit",
            address, event_id, quiz_number
        ))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "answers": answers,
            "time_spent": 120,
        }))
        .send()
        .await
        .expect("Submit failed")
}
