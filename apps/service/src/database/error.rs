use thiserror::Error;

/// Failures surfaced by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("Connection pool unavailable: {0}")]
    Pool(String),

    #[error("Record not found")]
    NotFound,

    #[error("Conflicting state: {0}")]
    Conflict(String),

    #[error("Malformed row: {0}")]
    InvalidRow(String),
}

impl From<deadpool::managed::PoolError<libsql::Error>> for StoreError {
    fn from(error: deadpool::managed::PoolError<libsql::Error>) -> Self {
        StoreError::Pool(error.to_string())
    }
}

impl StoreError {
    /// Whether the database rejected a write because of a UNIQUE index.
    /// Local connections report extended result codes.
    pub(crate) fn is_unique_violation(error: &libsql::Error) -> bool {
        matches!(
            error,
            libsql::Error::SqliteFailure(code, _) if *code == libsql::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}
