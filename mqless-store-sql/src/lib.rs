//! SQL-backed [`JobStore`](mqless_job::JobStore) for the mqless job processor.
//!
//! Every application gets its own table, `<app_id>_jobs`:
//!
//! | column       | type                     |
//! |--------------|--------------------------|
//! | `id`         | auto-increment key       |
//! | `created_at` | RFC 3339 UTC, nanosecond |
//! | `status`     | `queued`, `doing`, `finished` or `error` |
//! | `job_type`   | text                     |
//! | `payload`    | nullable text            |
//!
//! Exactly one of the `sqlite` (default), `postgres` or `mysql` features selects the backend.

#[cfg(not(any(feature = "postgres", feature = "mysql", feature = "sqlite")))]
compile_error!(
    "Enable exactly one of the `postgres`, `mysql`, or `sqlite` features for mqless-store-sql."
);

#[cfg(any(
    all(feature = "postgres", feature = "mysql"),
    all(feature = "postgres", feature = "sqlite"),
    all(feature = "mysql", feature = "sqlite"),
))]
compile_error!(
    "Activate only one backend feature (`postgres`, `mysql`, or `sqlite`) for mqless-store-sql."
);

mod error;
mod row;
mod schema;
mod store;

pub use row::JobRow;
pub use schema::{table_name, MAX_APP_ID_LEN};
pub use store::SqlJobStore;

pub use mqless_db_connection::utils::sanitize_database_url;
pub use mqless_db_connection::{create_pool, DbConnectionConfig, DbConnectionError, DbPool};
