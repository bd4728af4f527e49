//! Table naming, DDL and the statements used by [`SqlJobStore`](crate::SqlJobStore).

use once_cell::sync::Lazy;
use regex::Regex;

use mqless_job::{JobStatus, StoreError};

/// Longest accepted application id; keeps `<app_id>_jobs` within identifier limits.
pub const MAX_APP_ID_LEN: usize = 58;

const TABLE_SUFFIX: &str = "_jobs";

static APP_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^[A-Za-z_][A-Za-z0-9_]{{0,{}}}$", MAX_APP_ID_LEN - 1))
        .expect("valid app id regex")
});

/// Derive the job table name of `app_id`.
///
/// The name is interpolated into SQL, so only plain identifiers are accepted.
pub fn table_name(app_id: &str) -> Result<String, StoreError> {
    if !APP_ID_RE.is_match(app_id) {
        return Err(StoreError::InvalidTableName(format!(
            "{app_id}{TABLE_SUFFIX}"
        )));
    }
    Ok(format!("{app_id}{TABLE_SUFFIX}"))
}

#[cfg(feature = "postgres")]
fn placeholder(n: usize) -> String {
    format!("${n}")
}

#[cfg(not(feature = "postgres"))]
fn placeholder(_n: usize) -> String {
    "?".to_owned()
}

/// Statements that create the job table and its claim index.
pub fn create_table_statements(table: &str) -> Vec<String> {
    #[cfg(feature = "sqlite")]
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL,
            job_type TEXT NOT NULL,
            payload TEXT
        )"
    );
    #[cfg(feature = "postgres")]
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            created_at VARCHAR(35) NOT NULL,
            status VARCHAR(16) NOT NULL,
            job_type VARCHAR(255) NOT NULL,
            payload TEXT
        )"
    );
    #[cfg(feature = "mysql")]
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            created_at VARCHAR(35) NOT NULL,
            status VARCHAR(16) NOT NULL,
            job_type VARCHAR(255) NOT NULL,
            payload TEXT,
            INDEX (status, created_at)
        )"
    );

    #[cfg(not(feature = "mysql"))]
    {
        vec![
            create,
            format!("CREATE INDEX IF NOT EXISTS {table}_claim_idx ON {table} (status, created_at)"),
        ]
    }
    #[cfg(feature = "mysql")]
    {
        vec![create]
    }
}

/// Prepared SQL text for one job table.
#[derive(Debug, Clone)]
pub struct Queries {
    /// Oldest row in a given status. Binds: status.
    pub select_oldest: String,
    /// Compare-and-transition of one row. Binds: new status, id, expected status.
    pub transition: String,
    /// Binds: created_at, status, job_type, payload.
    pub insert: String,
    /// Forward-only status update per target status, indexed by [`JobStatus`]. Binds: status, id.
    update_status: [String; 4],
    /// Binds: id.
    pub find: String,
    /// Binds: status.
    pub count_by_status: String,
}

/// `UPDATE` moving a row to `to`, matching only rows whose current status may move there.
fn update_status_sql(table: &str, to: JobStatus) -> String {
    let sources: Vec<String> = JobStatus::ALL
        .iter()
        .filter(|from| from.can_transition_to(to))
        .map(|from| format!("'{}'", from.as_str()))
        .collect();
    format!(
        "UPDATE {table} SET status = {} WHERE id = {} AND status IN ({})",
        placeholder(1),
        placeholder(2),
        sources.join(", ")
    )
}

impl Queries {
    pub fn update_status(&self, to: JobStatus) -> &str {
        &self.update_status[to as usize]
    }

    pub fn new(table: &str) -> Self {
        let p = placeholder;
        let insert = format!(
            "INSERT INTO {table} (created_at, status, job_type, payload) VALUES ({}, {}, {}, {})",
            p(1),
            p(2),
            p(3),
            p(4)
        );
        #[cfg(feature = "postgres")]
        let insert = format!("{insert} RETURNING id");

        Self {
            select_oldest: format!(
                "SELECT id, created_at, status, job_type, payload FROM {table} \
                 WHERE status = {} ORDER BY created_at ASC, id ASC LIMIT 1",
                p(1)
            ),
            transition: format!(
                "UPDATE {table} SET status = {} WHERE id = {} AND status = {}",
                p(1),
                p(2),
                p(3)
            ),
            insert,
            update_status: JobStatus::ALL.map(|to| update_status_sql(table, to)),
            find: format!(
                "SELECT id, created_at, status, job_type, payload FROM {table} WHERE id = {}",
                p(1)
            ),
            count_by_status: format!("SELECT COUNT(*) FROM {table} WHERE status = {}", p(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifiers() {
        assert_eq!(table_name("worker_test").unwrap(), "worker_test_jobs");
        assert_eq!(table_name("_app2").unwrap(), "_app2_jobs");
        assert!(table_name(&"a".repeat(MAX_APP_ID_LEN)).is_ok());
    }

    #[test]
    fn rejects_unsafe_names() {
        for app_id in ["", "1app", "app-id", "app; DROP TABLE x", "app id"] {
            assert!(
                matches!(table_name(app_id), Err(StoreError::InvalidTableName(_))),
                "{app_id:?} should be rejected"
            );
        }
        assert!(table_name(&"a".repeat(MAX_APP_ID_LEN + 1)).is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn claim_is_a_guarded_update() {
        let queries = Queries::new("demo_jobs");
        assert_eq!(
            queries.transition,
            "UPDATE demo_jobs SET status = ? WHERE id = ? AND status = ?"
        );
        assert!(queries
            .select_oldest
            .ends_with("ORDER BY created_at ASC, id ASC LIMIT 1"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn status_updates_only_move_forward() {
        let queries = Queries::new("demo_jobs");
        assert_eq!(
            queries.update_status(JobStatus::Finished),
            "UPDATE demo_jobs SET status = ? WHERE id = ? AND status IN ('doing', 'finished')"
        );
        assert_eq!(
            queries.update_status(JobStatus::Queued),
            "UPDATE demo_jobs SET status = ? WHERE id = ? AND status IN ('queued')"
        );
        assert!(queries
            .update_status(JobStatus::Error)
            .ends_with("status IN ('doing', 'error')"));
    }
}
