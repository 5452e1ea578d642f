use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing — everything past this
/// point receives explicit structs, never the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub google_cloud_api_key: Option<String>,
    /// Ordered model fallback chain, first entry tried first.
    pub gemini_models: Vec<String>,
    /// Hard cap on a single model call. A timeout counts as an attempt
    /// failure, not a hang.
    pub llm_call_timeout: Duration,
    pub encryption_key: String,
    pub port: u16,
    pub rust_log: String,
}

const DEFAULT_MODELS: &str = "gemini-1.5-flash,gemini-1.5-pro,gemini-2.0-flash";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let gemini_models = std::env::var("GEMINI_MODELS")
            .unwrap_or_else(|_| DEFAULT_MODELS.to_string())
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>();
        anyhow::ensure!(
            !gemini_models.is_empty(),
            "GEMINI_MODELS must name at least one model"
        );

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            google_cloud_api_key: std::env::var("GOOGLE_CLOUD_API_KEY").ok(),
            gemini_models,
            llm_call_timeout: Duration::from_secs(
                std::env::var("LLM_CALL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<u64>()
                    .context("LLM_CALL_TIMEOUT_SECS must be a number of seconds")?,
            ),
            encryption_key: require_env("ENCRYPTION_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
