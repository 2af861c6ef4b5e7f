use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::PipelineSettings;

const DEFAULT_DRAFT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a number does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Drafts go to Redis when set, otherwise they stay in memory.
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub draft_ttl_secs: u64,
    pub pipeline: PipelineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = PipelineSettings::default();
        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            draft_ttl_secs: parse_env("DRAFT_TTL_SECS", DEFAULT_DRAFT_TTL_SECS)?,
            pipeline: PipelineSettings {
                collaborator_timeout: Duration::from_secs(parse_env(
                    "COLLABORATOR_TIMEOUT_SECS",
                    defaults.collaborator_timeout.as_secs(),
                )?),
                ai_question_cap: parse_env("AI_QUESTION_CAP", defaults.ai_question_cap)?,
                improve_score_threshold: parse_env("IMPROVE_SCORE_THRESHOLD", defaults.improve_score_threshold)?,
                max_improve_loops: parse_env("MAX_IMPROVE_LOOPS", defaults.max_improve_loops)?,
                loop_question_cap: parse_env("LOOP_QUESTION_CAP", defaults.loop_question_cap)?,
                min_summary_chars: parse_env("MIN_SUMMARY_CHARS", defaults.min_summary_chars)?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
