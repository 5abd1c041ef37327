// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Number of quizzes generated for every event.
pub const QUIZZES_PER_EVENT: i64 = 5;

/// Number of questions assigned to each quiz.
pub const QUESTIONS_PER_QUIZ: i64 = 20;

/// Question-bank size a subject must reach before an event can be created.
pub const REQUIRED_QUESTIONS: i64 = QUIZZES_PER_EVENT * QUESTIONS_PER_QUIZ;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
        }
    }
}
