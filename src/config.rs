// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{Duration, Utc};
use dotenvy::dotenv;

/// Number of ranking questions in a mock exam.
pub const RANKING_QUESTIONS_COUNT: usize = 28;

/// Number of best-three questions in a mock exam.
pub const BEST_THREE_QUESTIONS_COUNT: usize = 28;

/// Wall-clock budget of a mock exam.
pub const EXAM_DURATION_MINUTES: i64 = 105;

/// Shape of an assembled exam.
#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub ranking_quota: usize,
    pub best_three_quota: usize,
    pub duration: Duration,
}

impl ExamSettings {
    pub fn total_questions(&self) -> usize {
        self.ranking_quota + self.best_three_quota
    }
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            ranking_quota: RANKING_QUESTIONS_COUNT,
            best_three_quota: BEST_THREE_QUESTIONS_COUNT,
            duration: Duration::minutes(EXAM_DURATION_MINUTES),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub exam: ExamSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let jwt_expiration = parse_or("JWT_EXPIRATION", 86_400u64);
        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)));

        let exam = ExamSettings {
            ranking_quota: parse_or("SJT_RANKING_QUESTIONS", RANKING_QUESTIONS_COUNT),
            best_three_quota: parse_or("SJT_BEST_THREE_QUESTIONS", BEST_THREE_QUESTIONS_COUNT),
            duration: exam_duration(parse_or("SJT_EXAM_DURATION_MINUTES", EXAM_DURATION_MINUTES)),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            exam,
        }
    }
}

/// Reads an optional variable, keeping the default when it is missing or malformed.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Builds the exam length, keeping the default for negative or oversized values.
fn exam_duration(minutes: i64) -> Duration {
    match Duration::try_minutes(minutes) {
        Some(duration) if minutes >= 0 && Utc::now().checked_add_signed(duration).is_some() => {
            duration
        }
        _ => {
            tracing::warn!(
                "Ignoring out-of-range SJT_EXAM_DURATION_MINUTES: {}",
                minutes
            );
            Duration::minutes(EXAM_DURATION_MINUTES)
        }
    }
}
