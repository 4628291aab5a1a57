// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Shared secret of the identity provider's signed assertions.
    pub identity_secret: String,
    /// Emails under this domain sign in as students.
    pub student_email_domain: String,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub store_timeout: Duration,
    pub scorer_url: Option<Url>,
    pub scorer_timeout: Duration,
    pub rust_log: String,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let jwt_secret = required("JWT_SECRET")?;
        let identity_secret = required("IDENTITY_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 86_400u64)?;

        let student_email_domain = optional("STUDENT_EMAIL_DOMAIN")
            .unwrap_or_else(|| "students.example.edu".to_string());

        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let cors_origins = optional("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let store_timeout = Duration::from_secs(parsed("STORE_TIMEOUT_SECS", 10u64)?);

        let scorer_url = match optional("SCORER_URL") {
            Some(raw) => Some(Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                key: "SCORER_URL",
                reason: e.to_string(),
            })?),
            None => None,
        };
        let scorer_timeout = Duration::from_secs(parsed("SCORER_TIMEOUT_SECS", 15u64)?);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            identity_secret,
            student_email_domain,
            bind_addr,
            cors_origins,
            store_timeout,
            scorer_url,
            scorer_timeout,
            rust_log,
        })
    }
}
