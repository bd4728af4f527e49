#[cfg(feature = "mysql")]
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{error, info};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;
use crate::utils::sanitize_database_url;

#[cfg(not(any(feature = "postgres", feature = "mysql", feature = "sqlite")))]
compile_error!(
    "Enable exactly one of the `postgres`, `mysql`, or `sqlite` features for mqless-db-connection."
);

#[cfg(any(
    all(feature = "postgres", feature = "mysql"),
    all(feature = "postgres", feature = "sqlite"),
    all(feature = "mysql", feature = "sqlite"),
))]
compile_error!(
    "Activate only one backend feature (`postgres`, `mysql`, or `sqlite`) for mqless-db-connection."
);

#[cfg(feature = "postgres")]
pub type DbPool = PgPool;
#[cfg(feature = "mysql")]
pub type DbPool = MySqlPool;
#[cfg(feature = "sqlite")]
pub type DbPool = SqlitePool;

#[cfg(feature = "postgres")]
type DbPoolOptions = PgPoolOptions;
#[cfg(feature = "mysql")]
type DbPoolOptions = MySqlPoolOptions;
#[cfg(feature = "sqlite")]
type DbPoolOptions = SqlitePoolOptions;

// SQLite memory database patterns for efficient checking
#[cfg(feature = "sqlite")]
pub const SQLITE_MEMORY_PATTERNS: &[&[u8]] = &[b":memory:", b"mode=memory"];

/// Creates a new backend-specific connection pool using the provided configuration.
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    let database_url = sanitize_database_url(&config.url);
    info!(
        database_url = %database_url,
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to job database"
    );

    match create_pool_inner(config).await {
        Ok(pool) => {
            info!(database_url = %database_url, "job database pool ready");
            Ok(pool)
        }
        Err(err) => {
            error!(database_url = %database_url, error = %err, "failed to connect to job database");
            Err(err)
        }
    }
}

async fn create_pool_inner(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;
    let url = config.url.trim();

    #[allow(unused_mut)]
    let mut max_connections = config.max_connections;
    #[allow(unused_mut)]
    let mut min_connections = config.min_connections;

    // Every connection to an in-memory SQLite database opens a database of its own.
    #[cfg(feature = "sqlite")]
    {
        if is_sqlite_memory_url(url) {
            max_connections = 1;
            min_connections = min_connections.min(1);
        } else {
            ensure_sqlite_db_file_exists(url)?;
        }
    }

    let mut opts = DbPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(config.connect_timeout());

    #[cfg(not(feature = "sqlite"))]
    {
        opts = opts.test_before_acquire(config.test_before_acquire);
    }

    #[cfg(feature = "sqlite")]
    {
        if is_sqlite_memory_url(url) {
            // the database lives exactly as long as its only connection
            opts = opts
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>);
        } else if let Some(idle) = config.idle_timeout() {
            opts = opts.idle_timeout(idle);
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        if let Some(idle) = config.idle_timeout() {
            opts = opts.idle_timeout(idle);
        }
    }

    opts.connect(url).await.map_err(Into::into)
}

#[cfg(feature = "sqlite")]
pub fn is_sqlite_memory_url(url: &str) -> bool {
    let url_bytes = url.as_bytes();
    SQLITE_MEMORY_PATTERNS.iter().any(|&pattern| {
        url_bytes
            .windows(pattern.len())
            .any(|w| w.eq_ignore_ascii_case(pattern))
    })
}

/// Extract the file path from a SQLite connection URL.
///
/// Returns `None` for in-memory databases and empty paths.
#[cfg(feature = "sqlite")]
pub fn sqlite_file_path(url: &str) -> Option<&str> {
    if is_sqlite_memory_url(url) {
        return None;
    }

    let mut path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    path = path.strip_prefix("file:").unwrap_or(path);
    if let Some(idx) = path.find('?') {
        path = &path[..idx];
    }

    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    // "/C:/..." on Windows
    if path.len() > 2 && path.starts_with('/') && path.as_bytes().get(2) == Some(&b':') {
        Some(&path[1..])
    } else {
        Some(path)
    }
}

/// Create the parent directory and the database file so sqlx can open it.
#[cfg(feature = "sqlite")]
fn ensure_sqlite_db_file_exists(database_url: &str) -> Result<(), DbConnectionError> {
    use std::fs::{create_dir_all, File};
    use std::io;
    use std::path::Path;

    let Some(clean_path) = sqlite_file_path(database_url) else {
        return Ok(());
    };

    let db_path = Path::new(clean_path);
    if let Some(parent) = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        create_dir_all(parent).map_err(|e| {
            DbConnectionError::FileCreation(format!(
                "failed to create parent directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    if !db_path.exists() {
        File::create(db_path).map_err(|e| {
            let msg = if e.kind() == io::ErrorKind::PermissionDenied {
                format!("permission denied creating '{}': {e}", db_path.display())
            } else {
                format!("failed to create DB file '{}': {e}", db_path.display())
            };
            DbConnectionError::FileCreation(msg)
        })?;
    }

    Ok(())
}
