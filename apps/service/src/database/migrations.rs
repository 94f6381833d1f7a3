use chrono::Utc;
use libsql::Connection;
use serde::Serialize;
use tracing::info;

use super::error::StoreError;

/// One schema step. Statements run in order; versions are never reused.
struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Monitors, metrics and alerts",
        statements: &[
            "CREATE TABLE IF NOT EXISTS monitors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                check_interval INTEGER NOT NULL DEFAULT 5,
                status TEXT NOT NULL DEFAULT 'unknown',
                last_checked_at INTEGER,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                monitor_id INTEGER NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                status_code INTEGER,
                response_time_ms INTEGER,
                checked_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                monitor_id INTEGER NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'active',
                issue TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                acknowledged_at INTEGER,
                resolved_at INTEGER
            )",
        ],
    },
    Migration {
        version: 2,
        description: "Single active alert per monitor and lookup indexes",
        statements: &[
            // Backs the one-active-alert rule across processes
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_one_active
                ON alerts(monitor_id) WHERE status = 'active'",
            "CREATE INDEX IF NOT EXISTS idx_metrics_monitor_checked
                ON metrics(monitor_id, checked_at)",
            "CREATE INDEX IF NOT EXISTS idx_monitors_created ON monitors(created_at)",
        ],
    },
];

/// Latest version this build knows how to create
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema versions before and after a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
}

impl MigrationReport {
    pub fn applied_any(&self) -> bool {
        self.to_version > self.from_version
    }
}

/// Bring the schema up to [`latest_version`]. Safe to call on every start-up;
/// both binaries do.
pub async fn run_migrations(conn: &Connection) -> Result<MigrationReport, StoreError> {
    apply_pending(conn, MIGRATIONS).await
}

async fn apply_pending(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<MigrationReport, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let from_version = current_version(conn).await?;
    let mut to_version = from_version;

    for migration in migrations.iter().filter(|m| m.version > from_version) {
        // Each version lands completely or not at all
        let tx = conn.transaction().await?;
        if let Err(error) = apply(&tx, migration).await {
            tx.rollback().await?;
            return Err(error);
        }
        tx.commit().await?;

        to_version = migration.version;
        info!(version = migration.version, "Applied migration: {}", migration.description);
    }

    if to_version == from_version {
        info!(version = from_version, "Database schema is up to date");
    }

    Ok(MigrationReport { from_version, to_version })
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<(), StoreError> {
    for statement in migration.statements {
        conn.execute(statement, ()).await?;
    }

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![migration.version, Utc::now().timestamp(), migration.description],
    )
    .await?;

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn.query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", ()).await?;

    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}
