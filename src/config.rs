use std::env;
use std::fmt::Display;
use std::str::FromStr;

use actix_web::http::header::HeaderValue;
use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the repository lives. Shared by the server and the seeder.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub name: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: required(&lookup, "DATABASE_URL")?,
            name: try_load(&lookup, "DATABASE_NAME", "recipe_master")?,
        })
    }

    /// True for `memory://` URLs, whose data ends with the process.
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub jwt_lifetime: chrono::Duration,
    pub allowed_origin: HeaderValue,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lifetime_minutes: i64 = try_load(&lookup, "JWT_LIFETIME_MINUTES", "60")?;
        if lifetime_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_LIFETIME_MINUTES",
                value: lifetime_minutes.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let origin: String = try_load(&lookup, "CORS_ALLOWED_ORIGIN", "*")?;
        let allowed_origin = HeaderValue::from_str(&origin).map_err(|e| ConfigError::Invalid {
            key: "CORS_ALLOWED_ORIGIN",
            value: origin.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            bind_address: try_load(&lookup, "BIND_ADDRESS", "127.0.0.1:8189")?,
            database: DatabaseConfig::from_lookup(&lookup)?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            jwt_lifetime: chrono::Duration::minutes(lifetime_minutes),
            allowed_origin,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
