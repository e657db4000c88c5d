use secrecy::Secret;
use std::collections::HashMap;
use std::env;

use crate::constants::{crypto, token};
use crate::core::errors::WardenError;
use crate::core::models::Operation;
use crate::core::rate_limit::RateLimitConfig;

/// Process-wide configuration, read once at startup.
///
/// The signing secret is wrapped in `secrecy::Secret` so it cannot leak
/// through Debug formatting; when absent, an ephemeral key is generated and
/// minted links die with the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub signing_secret: Option<Secret<String>>,
    pub signing_algorithm: String,
    pub default_token_lifetime_days: u32,
    pub max_token_lifetime_days: u32,
    /// Budget for each external collaborator call; on expiry the request is
    /// denied, never admitted.
    pub collaborator_timeout_ms: u64,
    pub session_idle_ttl_secs: i64,
    pub revocation_retention_days: u32,
    pub rate_limits: HashMap<Operation, RateLimitConfig>,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, WardenError> {
        Ok(Self {
            signing_secret: env::var("WARDEN_SIGNING_SECRET").ok().map(Secret::new),
            signing_algorithm: env::var("WARDEN_SIGNING_ALGORITHM")
                .unwrap_or_else(|_| crypto::SIGNING_ALGORITHM.to_string()),
            default_token_lifetime_days: parse_env(
                "WARDEN_DEFAULT_TOKEN_LIFETIME_DAYS",
                token::DEFAULT_LIFETIME_DAYS,
            )?,
            max_token_lifetime_days: parse_env(
                "WARDEN_MAX_TOKEN_LIFETIME_DAYS",
                token::MAX_LIFETIME_DAYS,
            )?,
            collaborator_timeout_ms: parse_env("WARDEN_COLLABORATOR_TIMEOUT_MS", 2_000)?,
            session_idle_ttl_secs: parse_env("WARDEN_SESSION_IDLE_TTL_SECS", 86_400)?,
            revocation_retention_days: parse_env("WARDEN_REVOCATION_RETENTION_DAYS", 30)?,
            rate_limits: Self::default_rate_limits(),
            log_level: env::var("WARDEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("WARDEN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        })
    }

    /// Per-operation throttling defaults. Mint and destructive operations are
    /// held much tighter than plain viewing.
    pub fn default_rate_limits() -> HashMap<Operation, RateLimitConfig> {
        let mut limits = HashMap::new();
        limits.insert(
            Operation::Generate,
            RateLimitConfig {
                per_minute: 10,
                per_hour: 100,
                per_day: 500,
                burst_allowance: 5,
                cooldown_seconds: 30,
            },
        );
        limits.insert(
            Operation::View,
            RateLimitConfig {
                per_minute: 60,
                per_hour: 600,
                per_day: 5_000,
                burst_allowance: 10,
                cooldown_seconds: 10,
            },
        );
        limits.insert(
            Operation::Download,
            RateLimitConfig {
                per_minute: 30,
                per_hour: 300,
                per_day: 1_000,
                burst_allowance: 10,
                cooldown_seconds: 30,
            },
        );
        limits.insert(
            Operation::Delete,
            RateLimitConfig {
                per_minute: 10,
                per_hour: 50,
                per_day: 100,
                burst_allowance: 3,
                cooldown_seconds: 60,
            },
        );
        limits.insert(
            Operation::Share,
            RateLimitConfig {
                per_minute: 20,
                per_hour: 100,
                per_day: 200,
                burst_allowance: 5,
                cooldown_seconds: 30,
            },
        );
        limits.insert(
            Operation::RevokeAccess,
            RateLimitConfig {
                per_minute: 10,
                per_hour: 50,
                per_day: 100,
                burst_allowance: 3,
                cooldown_seconds: 60,
            },
        );
        limits
    }

    /// Deterministic configuration for tests: fixed secret, fast collaborator
    /// timeout.
    pub fn test_config() -> Self {
        Self {
            signing_secret: Some(Secret::new("warden-test-secret".to_string())),
            collaborator_timeout_ms: 200,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signing_secret: None,
            signing_algorithm: crypto::SIGNING_ALGORITHM.to_string(),
            default_token_lifetime_days: token::DEFAULT_LIFETIME_DAYS,
            max_token_lifetime_days: token::MAX_LIFETIME_DAYS,
            collaborator_timeout_ms: 2_000,
            session_idle_ttl_secs: 86_400,
            revocation_retention_days: 30,
            rate_limits: Self::default_rate_limits(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, WardenError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| WardenError::Validation(format!("bad value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
