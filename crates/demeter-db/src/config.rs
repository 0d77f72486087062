//! Environment-driven settings for the shared PostgreSQL store.
//!
//! One database backs the item store, the task queue, and the rate limiter,
//! so every worker process must point `DATABASE_URL` at the same instance
//! for the cross-process queue and limiter guarantees to hold.

use std::env;

use demeter_core::AppError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u32,
}

impl DatabaseConfig {
    /// Build a config from the process environment.
    ///
    /// - `DATABASE_URL` (required, `postgres://` or `postgresql://`)
    /// - `DATABASE_MAX_CONNECTIONS` (default 5)
    /// - `DATABASE_ACQUIRE_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self, AppError> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| AppError::ConfigError("DATABASE_URL is not set".into()))?;
        check_scheme(&url)?;
        Ok(Self {
            url,
            max_connections: positive_or(
                "DATABASE_MAX_CONNECTIONS",
                env::var("DATABASE_MAX_CONNECTIONS").ok(),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            acquire_timeout_secs: positive_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECS").ok(),
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
        })
    }
}

/// The pool accepts any libpq-style URL; catching a wrong scheme here gives
/// a clearer message than a connect failure would.
fn check_scheme(url: &str) -> Result<(), AppError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(())
    } else {
        Err(AppError::ConfigError(
            "DATABASE_URL must use a postgres:// or postgresql:// scheme".into(),
        ))
    }
}

fn positive_or(name: &str, raw: Option<String>, default: u32) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::ConfigError(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}
