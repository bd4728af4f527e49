//! Connection pool setup for the SQL job store.
//!
//! Exactly one backend feature (`sqlite`, `postgres` or `mysql`) selects the concrete
//! [`DbPool`] type.

pub mod config;
pub mod error;
pub mod pool;
#[cfg(test)]
mod test;
pub mod utils;

pub use config::DbConnectionConfig;
pub use error::DbConnectionError;
pub use pool::{create_pool, DbPool};
