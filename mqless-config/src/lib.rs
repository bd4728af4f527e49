use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Application ids become part of a table name, so they are restricted to identifiers.
static APP_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,57}$").unwrap());

const SUPPORTED_URL_SCHEMES: &[&str] = &["sqlite", "postgres", "postgresql", "mysql", "mariadb"];

#[derive(Debug, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub worker: Option<WorkerSection>,
    #[serde(default)]
    pub poll: Option<PollSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub worker_count: Option<usize>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub require_error_handler: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PollSection {
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try every enabled format in turn.
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Resolved runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub worker: WorkerSettings,
    pub poll: PollSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSettings {
    pub app_id: String,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub require_error_handler: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollSettings {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: WorkerSettings {
                app_id: "mqless".to_string(),
                worker_count: 1,
                queue_capacity: 1024,
                require_error_handler: true,
            },
            poll: PollSettings { interval_ms: 1000 },
            database: DatabaseSettings {
                url: "sqlite://mqless.sqlite".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_secs: 30,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        apply_file(&mut cfg, load_raw_from_file(p)?);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Overlay the values present in a parsed file onto `cfg`.
pub fn apply_file(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(worker) = raw.worker {
        apply_opt!(cfg.worker.app_id, worker.app_id);
        apply_opt!(cfg.worker.worker_count, worker.worker_count);
        apply_opt!(cfg.worker.queue_capacity, worker.queue_capacity);
        apply_opt!(cfg.worker.require_error_handler, worker.require_error_handler);
    }
    if let Some(poll) = raw.poll {
        apply_opt!(cfg.poll.interval_ms, poll.interval_ms);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.url, db.url);
        apply_opt!(cfg.database.max_connections, db.max_connections);
        apply_opt!(cfg.database.min_connections, db.min_connections);
        apply_opt!(cfg.database.connect_timeout_secs, db.connect_timeout_secs);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
}

#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all `MQLESS_*` environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Worker
    if let Some(v) = env_str("MQLESS_APP_ID") {
        cfg.worker.app_id = v;
    }
    if let Some(v) = env_parse::<usize>("MQLESS_WORKER_COUNT")? {
        cfg.worker.worker_count = v;
    }
    if let Some(v) = env_parse::<usize>("MQLESS_QUEUE_CAPACITY")? {
        cfg.worker.queue_capacity = v;
    }
    if let Some(v) = env_bool("MQLESS_REQUIRE_ERROR_HANDLER")? {
        cfg.worker.require_error_handler = v;
    }

    // Poll
    if let Some(v) = env_parse::<u64>("MQLESS_POLL_INTERVAL_MS")? {
        cfg.poll.interval_ms = v;
    }

    // Database
    if let Some(v) = env_str("MQLESS_DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = env_parse::<u32>("MQLESS_DB_MAX_CONNECTIONS")? {
        cfg.database.max_connections = v;
    }
    if let Some(v) = env_parse::<u32>("MQLESS_DB_MIN_CONNECTIONS")? {
        cfg.database.min_connections = v;
    }
    if let Some(v) = env_parse::<u64>("MQLESS_DB_CONNECT_TIMEOUT_SECS")? {
        cfg.database.connect_timeout_secs = v;
    }

    // Logging
    if let Some(v) = env_str("MQLESS_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("MQLESS_LOG_JSON")? {
        cfg.logging.json = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if !APP_ID_REGEX.is_match(&cfg.worker.app_id) {
        return Err(ConfigError::Validation(format!(
            "worker.app_id must be an identifier of at most 58 characters: {:?}",
            cfg.worker.app_id
        )));
    }
    if cfg.worker.worker_count == 0 {
        return Err(ConfigError::Validation(
            "worker.worker_count must be > 0".into(),
        ));
    }
    if cfg.worker.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "worker.queue_capacity must be > 0".into(),
        ));
    }
    if cfg.poll.interval_ms == 0 {
        return Err(ConfigError::Validation("poll.interval_ms must be > 0".into()));
    }

    let db_url = cfg.database.url.trim();
    if db_url.is_empty() {
        return Err(ConfigError::Validation("database.url must be set".into()));
    }
    match url::Url::parse(db_url) {
        Ok(u) if SUPPORTED_URL_SCHEMES.contains(&u.scheme()) => {}
        Ok(u) => {
            return Err(ConfigError::Validation(format!(
                "unsupported database scheme: {}",
                u.scheme()
            )))
        }
        Err(_) => return Err(ConfigError::Validation("invalid database.url".into())),
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }
    if cfg.database.min_connections > cfg.database.max_connections {
        return Err(ConfigError::Validation(
            "database.min_connections must not exceed database.max_connections".into(),
        ));
    }

    if cfg.logging.level.trim().is_empty() {
        return Err(ConfigError::Validation("logging.level must be set".into()));
    }
    Ok(())
}
