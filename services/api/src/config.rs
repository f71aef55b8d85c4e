//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub groq_api_key: String,
    pub groq_api_base: String,
    pub groq_model: String,
    pub llm_timeout: Duration,
    /// Origin of the web client, allowed by CORS.
    pub client_url: String,
    /// Public base URL of this server, used to build file URLs.
    pub server_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub auth_session_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:5000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load LLM Settings ---
        let groq_api_key = required("GROQ_API_KEY")?;
        let groq_api_base = var_or("GROQ_API_BASE", "https://api.groq.com/openai/v1");
        let groq_model = var_or("GROQ_MODEL", "llama-3.3-70b-versatile");
        let llm_timeout = Duration::from_secs(parse_number(&lookup, "LLM_TIMEOUT_SECS", 30)?);

        // --- Load Web & Storage Settings ---
        let client_url = var_or("CLIENT_URL", "http://localhost:3000");
        let server_url = var_or("SERVER_URL", "http://localhost:5000")
            .trim_end_matches('/')
            .to_string();
        let upload_dir = PathBuf::from(var_or("UPLOAD_DIR", "./uploads"));
        let max_upload_bytes = parse_number(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let auth_session_days = parse_number(&lookup, "AUTH_SESSION_DAYS", 30)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            groq_api_key,
            groq_api_base,
            groq_model,
            llm_timeout,
            client_url,
            server_url,
            upload_dir,
            max_upload_bytes,
            auth_session_days,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("GROQ_API_KEY", "gsk_test"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.groq_api_base, "https://api.groq.com/openai/v1");
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.auth_session_days, 30);
    }

    #[test]
    fn missing_required_var_is_reported() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/planner")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "GROQ_API_KEY"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("GROQ_API_KEY", "gsk_test"),
            ("LLM_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "LLM_TIMEOUT_SECS"));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("GROQ_API_KEY", "gsk_test"),
            ("BIND_ADDRESS", "nowhere"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "BIND_ADDRESS"));
    }

    #[test]
    fn server_url_loses_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/planner"),
            ("GROQ_API_KEY", "gsk_test"),
            ("SERVER_URL", "https://planner.example.com/"),
        ]))
        .unwrap();
        assert_eq!(config.server_url, "https://planner.example.com");
    }
}
