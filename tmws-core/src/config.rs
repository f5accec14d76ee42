//! Environment-driven configuration.
//!
//! Only the documented `TMWS_*` variables are consulted; everything else in
//! the environment is ignored. Production startup refuses weak or missing
//! secret keys.

use serde_json::Map;

use crate::constants::{
    DEFAULT_VECTOR_DIMENSION, RATE_LIMIT_REQUESTS_PER_MIN,
};
use crate::errors::{TmwsError, TmwsResult};

/// Deployment environment, from `TMWS_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> TmwsResult<Self> {
        match s {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(TmwsError::Validation {
                reason: format!("TMWS_ENVIRONMENT must be development|staging|production, got {other:?}"),
            }),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Secret-key fragments that fail production startup when present.
const WEAK_KEY_FRAGMENTS: &[&str] = &[
    "secret", "password", "changeme", "default", "example", "insecure", "12345678",
];

/// Runtime configuration assembled from the environment allowlist.
#[derive(Debug, Clone)]
pub struct TmwsConfig {
    pub database_url: String,
    pub secret_key: String,
    pub environment: Environment,
    /// Principal a session starts as, when set.
    pub agent_id: Option<String>,
    pub agent_namespace: Option<String>,
    pub agent_capabilities: Map<String, serde_json::Value>,
    /// Development fallback principal when no agent is configured.
    pub allow_default_agent: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    pub embedding_model: String,
    pub vector_dimension: usize,
    pub log_level: Option<String>,
}

impl TmwsConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> TmwsResult<Self> {
        let environment = match std::env::var("TMWS_ENVIRONMENT") {
            Ok(v) => Environment::parse(&v)?,
            Err(_) => Environment::Development,
        };

        let database_url = std::env::var("TMWS_DATABASE_URL")
            .map_err(|_| TmwsError::validation("TMWS_DATABASE_URL is required"))?;

        let secret_key = std::env::var("TMWS_SECRET_KEY")
            .map_err(|_| TmwsError::validation("TMWS_SECRET_KEY is required"))?;
        check_secret_key(&secret_key, environment)?;

        let agent_capabilities = match std::env::var("TMWS_AGENT_CAPABILITIES") {
            Ok(raw) => serde_json::from_str::<Map<String, serde_json::Value>>(&raw)
                .map_err(|e| TmwsError::Validation {
                    reason: format!("TMWS_AGENT_CAPABILITIES is not a JSON object: {e}"),
                })?,
            Err(_) => Map::new(),
        };

        Ok(Self {
            database_url,
            secret_key,
            environment,
            agent_id: env_opt("TMWS_AGENT_ID"),
            agent_namespace: env_opt("TMWS_AGENT_NAMESPACE"),
            agent_capabilities,
            allow_default_agent: env_opt("TMWS_ALLOW_DEFAULT_AGENT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            rate_limit_requests: env_parse("TMWS_RATE_LIMIT_REQUESTS")?
                .unwrap_or(RATE_LIMIT_REQUESTS_PER_MIN),
            rate_limit_period_secs: env_parse("TMWS_RATE_LIMIT_PERIOD")?.unwrap_or(60),
            embedding_model: env_opt("TMWS_EMBEDDING_MODEL")
                .unwrap_or_else(|| "hashed-term-v1".to_string()),
            vector_dimension: env_parse("TMWS_VECTOR_DIMENSION")?
                .unwrap_or(DEFAULT_VECTOR_DIMENSION),
            log_level: env_opt("TMWS_LOG_LEVEL"),
        })
    }
}

/// Reject short keys everywhere and weak keys in production.
pub fn check_secret_key(key: &str, environment: Environment) -> TmwsResult<()> {
    if key.len() < 32 {
        return Err(TmwsError::validation(
            "TMWS_SECRET_KEY must be at least 32 characters",
        ));
    }
    if environment.is_production() {
        let lowered = key.to_ascii_lowercase();
        if WEAK_KEY_FRAGMENTS.iter().any(|frag| lowered.contains(frag)) {
            return Err(TmwsError::validation(
                "TMWS_SECRET_KEY matches a known-weak pattern",
            ));
        }
        let first = key.chars().next();
        if key.chars().all(|c| Some(c) == first) {
            return Err(TmwsError::validation(
                "TMWS_SECRET_KEY is a repeated single character",
            ));
        }
    }
    Ok(())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> TmwsResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| TmwsError::Validation {
                reason: format!("{name} is not a valid number: {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses() {
        assert_eq!(Environment::parse("development").unwrap(), Environment::Development);
        assert_eq!(Environment::parse("production").unwrap(), Environment::Production);
        assert!(Environment::parse("prod").is_err());
    }

    #[test]
    fn short_keys_rejected_everywhere() {
        assert!(check_secret_key("short", Environment::Development).is_err());
        assert!(check_secret_key("short", Environment::Production).is_err());
    }

    #[test]
    fn weak_keys_rejected_in_production_only() {
        let weak = "changeme-changeme-changeme-changeme";
        assert!(check_secret_key(weak, Environment::Development).is_ok());
        assert!(check_secret_key(weak, Environment::Production).is_err());

        let repeated = "a".repeat(40);
        assert!(check_secret_key(&repeated, Environment::Production).is_err());

        let strong = "kR8mX2vQ9pL4nW7jT3bY6hF1dS5gZ0cA";
        assert!(check_secret_key(strong, Environment::Production).is_ok());
    }
}
