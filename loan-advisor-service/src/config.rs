use anyhow::{Context as _, Result, anyhow};
use loan_advisor::DEFAULT_GEMINI_ENDPOINT;

pub const DEFAULT_MODEL_PATH: &str = "models/loan_forest.json";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// Configuration for the loan advisor service, read once at start.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gemini_api_key: String,
    pub gemini_endpoint: String,
    pub model_path: String,
    pub port: u16,
    pub session_ttl_minutes: i64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("GEMINI_API_KEY not set"))?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => DEFAULT_PORT,
        };

        let session_ttl_minutes = match lookup("SESSION_TTL_MINUTES") {
            Some(raw) => {
                let minutes = raw.parse::<i64>().with_context(|| {
                    format!("SESSION_TTL_MINUTES must be a whole number, got '{}'", raw)
                })?;
                if minutes <= 0 {
                    return Err(anyhow!("SESSION_TTL_MINUTES must be positive"));
                }
                minutes
            }
            None => DEFAULT_SESSION_TTL_MINUTES,
        };

        Ok(Self {
            gemini_api_key,
            gemini_endpoint: lookup("GEMINI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
            model_path: lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            port,
            session_ttl_minutes,
        })
    }
}
