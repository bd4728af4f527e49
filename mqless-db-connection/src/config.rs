use std::env::{self, VarError};
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DbConnectionError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_TEST_BEFORE_ACQUIRE: bool = true;

/// Settings for the pool backing the job table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConnectionConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DbConnectionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT_SECS),
            test_before_acquire: DEFAULT_TEST_BEFORE_ACQUIRE,
        }
    }
}

impl DbConnectionConfig {
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables using the supplied prefix.
    ///
    /// Expected variables:
    /// - `{PREFIX}_DATABASE_URL` (required)
    /// - `{PREFIX}_DB_MAX_CONNECTIONS` (optional)
    /// - `{PREFIX}_DB_MIN_CONNECTIONS` (optional)
    /// - `{PREFIX}_DB_CONNECT_TIMEOUT_SECS` (optional)
    /// - `{PREFIX}_DB_IDLE_TIMEOUT_SECS` (optional)
    /// - `{PREFIX}_DB_TEST_BEFORE_ACQUIRE` (optional, bool)
    pub fn from_env(prefix: &str) -> Result<Self, DbConnectionError> {
        let url_var = format!("{prefix}_DATABASE_URL");
        let url = env_value(&url_var)?.ok_or(DbConnectionError::MissingEnvVar(url_var))?;

        let mut config = Self::new(url);
        if let Some(max) = parse_number(prefix, "DB_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(min) = parse_number(prefix, "DB_MIN_CONNECTIONS")? {
            config.min_connections = min;
        }
        if let Some(secs) = parse_number(prefix, "DB_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = parse_number(prefix, "DB_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout_secs = Some(secs);
        }
        if let Some(value) = parse_bool(prefix, "DB_TEST_BEFORE_ACQUIRE")? {
            config.test_before_acquire = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the URL and pool bounds before a pool is opened.
    pub fn validate(&self) -> Result<(), DbConnectionError> {
        if self.url.trim().is_empty() {
            return Err(DbConnectionError::EmptyDatabaseUrl);
        }
        if self.max_connections == 0 {
            return Err(DbConnectionError::InvalidPoolSize(
                "max_connections must be greater than 0".to_owned(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DbConnectionError::InvalidPoolSize(
                "min_connections must not exceed max_connections".to_owned(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

/// Trimmed value of `var`; unset and blank variables are both `None`.
fn env_value(var: &str) -> Result<Option<String>, DbConnectionError> {
    match env::var(var) {
        Ok(value) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(DbConnectionError::InvalidUnicode(var.to_owned())),
    }
}

fn parse_number<T>(prefix: &str, suffix: &str) -> Result<Option<T>, DbConnectionError>
where
    T: FromStr<Err = ParseIntError>,
{
    let var = format!("{prefix}_{suffix}");
    let Some(value) = env_value(&var)? else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|source| DbConnectionError::InvalidNumber { var, source })
}

fn parse_bool(prefix: &str, suffix: &str) -> Result<Option<bool>, DbConnectionError> {
    let var = format!("{prefix}_{suffix}");
    let Some(value) = env_value(&var)? else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(DbConnectionError::InvalidBoolean { var, value }),
    }
}
