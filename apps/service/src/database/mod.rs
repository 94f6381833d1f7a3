/// Database abstraction layer
///
/// The engine only talks to storage through the [`Database`] trait; the
/// libsql-backed [`DatabaseImpl`] is the production implementation.

pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;

use std::sync::Arc;

pub use error::StoreError;
pub use repository::{Database, DatabaseImpl};

use crate::config::DatabaseConfig;
use crate::pool::open_pool;

pub use migrations::MigrationReport;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<MigrationReport, StoreError> {
    migrations::run_migrations(conn).await
}

/// Open the configured database file and bring its schema up to date
pub async fn open_database(config: &DatabaseConfig) -> Result<Arc<DatabaseImpl>, StoreError> {
    let pool = open_pool(&config.path, config.pool_size).await?;

    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);

    Ok(Arc::new(DatabaseImpl::new_from_pool(pool)))
}
