// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Points awarded per correct answer.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Participant ids starting with this prefix belong to automated opponents.
pub const BOT_ID_PREFIX: &str = "bot-";

/// Answers faster than this are considered humanly implausible.
pub const MIN_HUMAN_ANSWER_MS: u64 = 400;

/// Number of too-fast answers that flags a submission.
pub const FAST_ANSWERS_FLAGGED: usize = 3;

/// Minimum answer count before an all-too-fast submission is blocked outright.
pub const FAST_ANSWERS_BLOCKED_MIN: usize = 3;

/// Capacity of each per-challenge snapshot broadcast channel.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            port,
        }
    }
}
