//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
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

/// Settings for the OpenAI-compatible text generation endpoint.
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub media_root: PathBuf,
    pub cors_origin: String,
    pub ai: AiConfig,
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// How often tasks turned away by a full queue are offered again.
    pub sweep_interval: Duration,
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
        // --- Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let media_root = lookup("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./media"));

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Text Generation Settings (the key is optional) ---
        let api_key = lookup("AI_API_KEY")
            .or_else(|| lookup("DEEPSEEK_API_KEY"))
            .filter(|k| !k.trim().is_empty());
        let api_base =
            lookup("AI_API_BASE").unwrap_or_else(|| "https://api.deepseek.com/v1".to_string());
        let model = lookup("AI_MODEL").unwrap_or_else(|| "deepseek-chat".to_string());
        let max_tokens: u32 = parse_or(&lookup, "AI_MAX_TOKENS", "4000")?;
        let temperature: f32 = parse_or(&lookup, "AI_TEMPERATURE", "0.7")?;
        let timeout_secs: u64 = parse_or(&lookup, "AI_TIMEOUT_SECS", "60")?;

        // --- Worker Settings ---
        let worker_count: usize = parse_or(&lookup, "WORKER_COUNT", "1")?;
        if worker_count == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_COUNT".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let queue_capacity: usize = parse_or(&lookup, "QUEUE_CAPACITY", "256")?;
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "QUEUE_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let sweep_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", "30")?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            media_root,
            cors_origin,
            ai: AiConfig {
                api_key,
                api_base,
                model,
                max_tokens,
                temperature,
                timeout: Duration::from_secs(timeout_secs),
            },
            worker_count,
            queue_capacity,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/docgen")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.media_root, PathBuf::from("./media"));
        assert_eq!(config.ai.api_key, None);
        assert_eq!(config.ai.api_base, "https://api.deepseek.com/v1");
        assert_eq!(config.ai.model, "deepseek-chat");
        assert_eq!(config.ai.max_tokens, 4000);
        assert_eq!(config.ai.timeout, Duration::from_secs(60));
        assert_eq!(config.worker_count, 1);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn deepseek_key_is_accepted_as_alias() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/docgen"),
            ("DEEPSEEK_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn invalid_numbers_are_reported_by_name() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/docgen"),
            ("AI_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(v, _) if v == "AI_TIMEOUT_SECS"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/docgen"),
            ("WORKER_COUNT", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(v, _) if v == "WORKER_COUNT"));
    }
}
