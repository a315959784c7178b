//! Configuration management for the prompt gateway.
//!
//! Configuration can be set via environment variables (a `.env` file is loaded first):
//! - `GOOGLE_API_KEY` - Required. Gemini API key (`GEMINI_API_KEY` is accepted as a fallback).
//! - `DEFAULT_MODEL` - Optional. Model used by every agent. Defaults to `gemini-2.0-flash`.
//! - `GEMINI_API_BASE` - Optional. Base URL of the Gemini REST API.
//! - `HOST` - Optional. Server host. Defaults to `localhost`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_ITERATIONS` - Optional. Maximum model calls per request. Defaults to `20`.
//! - `APP_NAME` / `USER_ID` / `SESSION_ID` - Optional. Identifiers of the per-request session.
//! - `CURRENT_LOCATION` - Optional. Answer of the location tool. Defaults to `Chennai, India`.
//! - `AGENT_PROFILE` - Optional. `orchestrator` (default) or `simple`.
//! - `TEMPERATURE` / `TOP_P` / `MAX_OUTPUT_TOKENS` - Optional. Sampling parameters sent with every model call.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient Gemini errors. Defaults to `3`.

use std::str::FromStr;

use thiserror::Error;

use crate::llm::GenerationOptions;
use crate::session::SessionKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LOCATION: &str = "Chennai, India";
pub const DEFAULT_LLM_MAX_RETRIES: u32 = 3;

/// Which agent tree the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentProfile {
    /// Root orchestrator delegating to the time and location agents
    Orchestrator,
    /// A single conversational agent without tools
    Simple,
}

impl AgentProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Simple => "simple",
        }
    }
}

impl FromStr for AgentProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orchestrator" | "root" => Ok(Self::Orchestrator),
            "simple" | "assistant" => Ok(Self::Simple),
            other => Err(ConfigError::InvalidValue(
                "AGENT_PROFILE".to_string(),
                format!("unknown profile '{}'", other),
            )),
        }
    }
}

/// Identifiers used for the session created on every request.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            app_name: "TEST_APP".to_string(),
            user_id: "USER_1".to_string(),
            session_id: "SESSION_1".to_string(),
        }
    }
}

impl SessionSettings {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.app_name, &self.user_id, &self.session_id)
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: String,

    /// Model identifier shared by all agents
    pub default_model: String,

    /// Base URL of the Gemini REST API
    pub api_base: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum model calls in a single invocation
    pub max_iterations: usize,

    /// Session identifiers for each request
    pub session: SessionSettings,

    /// Fixed answer of the location tool
    pub location: String,

    /// Agent tree to serve
    pub profile: AgentProfile,

    /// Sampling parameters for every agent
    pub generation: GenerationOptions,

    /// Retries for transient Gemini errors
    pub llm_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither `GOOGLE_API_KEY` nor
    /// `GEMINI_API_KEY` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("GOOGLE_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let api_base = std::env::var("GEMINI_API_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "localhost".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_iterations = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            app_name: std::env::var("APP_NAME").unwrap_or(defaults.app_name),
            user_id: std::env::var("USER_ID").unwrap_or(defaults.user_id),
            session_id: std::env::var("SESSION_ID").unwrap_or(defaults.session_id),
        };

        let location =
            std::env::var("CURRENT_LOCATION").unwrap_or_else(|_| DEFAULT_LOCATION.to_string());

        let profile = match std::env::var("AGENT_PROFILE") {
            Ok(value) => value.parse()?,
            Err(_) => AgentProfile::Orchestrator,
        };

        let generation = GenerationOptions {
            temperature: optional_env("TEMPERATURE")?,
            top_p: optional_env("TOP_P")?,
            max_output_tokens: optional_env("MAX_OUTPUT_TOKENS")?,
        };

        let llm_max_retries =
            optional_env("LLM_MAX_RETRIES")?.unwrap_or(DEFAULT_LLM_MAX_RETRIES);

        Ok(Self {
            api_key,
            default_model,
            api_base,
            host,
            port,
            max_iterations,
            session,
            location,
            profile,
            generation,
            llm_max_retries,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            default_model,
            api_base: DEFAULT_API_BASE.to_string(),
            host: "localhost".to_string(),
            port: 8000,
            max_iterations: 20,
            session: SessionSettings::default(),
            location: DEFAULT_LOCATION.to_string(),
            profile: AgentProfile::Orchestrator,
            generation: GenerationOptions::default(),
            llm_max_retries: DEFAULT_LLM_MAX_RETRIES,
        }
    }
}

/// Read and parse an optional environment variable.
fn optional_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        _ => Ok(None),
    }
}
