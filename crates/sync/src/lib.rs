//! Recurring ERP synchronization jobs: coupons, catalog, stock.
//! Per-job schedule state, TTL run locks, and last-run snapshots live in a
//! pluggable key-value store; a timer scheduler fires one handler per job.

pub mod backend;
pub mod error;
pub mod interval;
pub mod lock;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod store_sqlite;
pub mod time;
pub mod types;

pub use error::{Error, Result};

/// Run database migrations for the sync crate.
///
/// This creates the `sync_options` and `sync_transients` tables. Should be
/// called at application startup when using [`store_sqlite::SqliteStore`]
/// with a shared pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
