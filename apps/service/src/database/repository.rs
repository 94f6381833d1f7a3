use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, TransactionBehavior, params};

use super::error::StoreError;
use super::models::{
    Alert, AlertStatus, Metric, Monitor, NewMetric, NewMonitor, from_millis, parse_column,
    to_millis,
};
use crate::monitoring::types::MonitorStatus;
use crate::pool::{LibsqlManager, LibsqlPool};

const MONITOR_COLUMNS: &str = "id, name, url, check_interval, status, last_checked_at, created_at";
const METRIC_COLUMNS: &str = "id, monitor_id, status, status_code, response_time_ms, checked_at";
const ALERT_COLUMNS: &str =
    "id, monitor_id, status, issue, created_at, acknowledged_at, resolved_at";

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Full roster, oldest registration first
    async fn list_monitors(&self) -> Result<Vec<Monitor>, StoreError>;

    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>, StoreError>;

    /// Store a validated monitor with status `unknown`
    async fn register_monitor(&self, monitor: &NewMonitor) -> Result<Monitor, StoreError>;

    /// Delete a monitor together with its metrics and alerts
    async fn delete_monitor(&self, id: i64) -> Result<bool, StoreError>;

    /// Write back the derived status and the time it was observed
    async fn update_monitor_status(
        &self,
        id: i64,
        status: MonitorStatus,
        checked_at: chrono::DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Append one metric sample
    async fn insert_metric(&self, metric: &NewMetric) -> Result<i64, StoreError>;

    /// Newest samples first
    async fn recent_metrics(&self, monitor_id: i64, limit: usize) -> Result<Vec<Metric>, StoreError>;

    async fn find_active_alert(&self, monitor_id: i64) -> Result<Option<Alert>, StoreError>;

    /// Open an alert. Fails with [`StoreError::Conflict`] when the monitor
    /// already has an active one.
    async fn create_alert(&self, monitor_id: i64, issue: &str) -> Result<Alert, StoreError>;

    /// Resolve every active alert of the monitor, returning how many changed
    async fn resolve_active_alerts(&self, monitor_id: i64) -> Result<u64, StoreError>;

    /// Manual transition active -> acknowledged
    async fn acknowledge_alert(&self, alert_id: i64) -> Result<Alert, StoreError>;

    /// Newest alerts first, optionally restricted to one monitor
    async fn list_alerts(&self, monitor_id: Option<i64>) -> Result<Vec<Alert>, StoreError>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        Ok(self.pool.get().await?)
    }

    async fn get_alert(&self, alert_id: i64) -> Result<Option<Alert>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?"), params![alert_id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(alert_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_monitors(&self) -> Result<Vec<Monitor>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY created_at, id"), ())
            .await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn register_monitor(&self, monitor: &NewMonitor) -> Result<Monitor, StoreError> {
        let conn = self.get_conn().await?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO monitors (name, url, check_interval, status, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                monitor.name.clone(),
                monitor.url.clone(),
                i64::from(monitor.check_interval),
                MonitorStatus::Unknown.as_str(),
                to_millis(created_at)
            ],
        )
        .await?;

        Ok(Monitor {
            id: conn.last_insert_rowid(),
            name: monitor.name.clone(),
            url: monitor.url.clone(),
            check_interval: monitor.check_interval,
            status: MonitorStatus::Unknown,
            last_checked_at: None,
            // Round-trip through storage precision
            created_at: from_millis(to_millis(created_at))?,
        })
    }

    async fn delete_monitor(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.get_conn().await?;
        let deleted = conn.execute("DELETE FROM monitors WHERE id = ?", params![id]).await?;
        Ok(deleted > 0)
    }

    async fn update_monitor_status(
        &self,
        id: i64,
        status: MonitorStatus,
        checked_at: chrono::DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE monitors SET status = ?, last_checked_at = ? WHERE id = ?",
                params![status.as_str(), to_millis(checked_at), id],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_metric(&self, metric: &NewMetric) -> Result<i64, StoreError> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO metrics (monitor_id, status, status_code, response_time_ms, checked_at) VALUES (?, ?, ?, ?, ?)",
            params![
                metric.monitor_id,
                metric.status.as_str(),
                metric.status_code.map(i64::from),
                metric.response_time_ms.map(|v| v as i64),
                to_millis(metric.checked_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn recent_metrics(&self, monitor_id: i64, limit: usize) -> Result<Vec<Metric>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {METRIC_COLUMNS} FROM metrics WHERE monitor_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?"
                ),
                params![monitor_id, limit as i64],
            )
            .await?;

        let mut metrics = Vec::new();
        while let Some(row) = rows.next().await? {
            metrics.push(metric_from_row(&row)?);
        }

        Ok(metrics)
    }

    async fn find_active_alert(&self, monitor_id: i64) -> Result<Option<Alert>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts WHERE monitor_id = ? AND status = 'active' LIMIT 1"
                ),
                params![monitor_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(alert_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_alert(&self, monitor_id: i64, issue: &str) -> Result<Alert, StoreError> {
        let conn = self.get_conn().await?;
        let created_at = from_millis(to_millis(Utc::now()))?;
        let conflict = || StoreError::Conflict(format!("monitor {monitor_id} already has an active alert"));

        // IMMEDIATE takes the write lock up front so the existence check and the
        // insert see the same state; the partial unique index is the backstop.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).await?;
        let insert = tx
            .execute(
                "INSERT INTO alerts (monitor_id, status, issue, created_at)
                 SELECT ?1, 'active', ?2, ?3
                 WHERE NOT EXISTS (SELECT 1 FROM alerts WHERE monitor_id = ?1 AND status = 'active')",
                params![monitor_id, issue, to_millis(created_at)],
            )
            .await;

        let inserted = match insert {
            Ok(inserted) => inserted,
            Err(error) => {
                tx.rollback().await?;
                return Err(if StoreError::is_unique_violation(&error) {
                    conflict()
                } else {
                    StoreError::Query(error)
                });
            }
        };

        if inserted == 0 {
            tx.rollback().await?;
            return Err(conflict());
        }

        let id = tx.last_insert_rowid();
        tx.commit().await?;

        Ok(Alert {
            id,
            monitor_id,
            status: AlertStatus::Active,
            issue: issue.to_string(),
            created_at,
            acknowledged_at: None,
            resolved_at: None,
        })
    }

    async fn resolve_active_alerts(&self, monitor_id: i64) -> Result<u64, StoreError> {
        let conn = self.get_conn().await?;
        let resolved = conn
            .execute(
                "UPDATE alerts SET status = 'resolved', resolved_at = ? WHERE monitor_id = ? AND status = 'active'",
                params![to_millis(Utc::now()), monitor_id],
            )
            .await?;

        Ok(resolved)
    }

    async fn acknowledge_alert(&self, alert_id: i64) -> Result<Alert, StoreError> {
        let updated = {
            let conn = self.get_conn().await?;
            conn.execute(
                "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ? WHERE id = ? AND status = 'active'",
                params![to_millis(Utc::now()), alert_id],
            )
            .await?
        };

        let alert = self.get_alert(alert_id).await?.ok_or(StoreError::NotFound)?;
        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "alert {alert_id} is {}, only active alerts can be acknowledged",
                alert.status
            )));
        }

        Ok(alert)
    }

    async fn list_alerts(&self, monitor_id: Option<i64>) -> Result<Vec<Alert>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = match monitor_id {
            Some(id) => {
                conn.query(
                    &format!(
                        "SELECT {ALERT_COLUMNS} FROM alerts WHERE monitor_id = ? ORDER BY created_at DESC, id DESC"
                    ),
                    params![id],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY created_at DESC, id DESC"),
                    (),
                )
                .await?
            }
        };

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(alert_from_row(&row)?);
        }

        Ok(alerts)
    }
}

fn optional_time(value: Option<i64>) -> Result<Option<chrono::DateTime<Utc>>, StoreError> {
    value.map(from_millis).transpose()
}

/// Stored integers must fit the model's narrower type; anything else is a corrupt row
fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

fn monitor_from_row(row: &Row) -> Result<Monitor, StoreError> {
    let status: String = row.get(4)?;

    Ok(Monitor {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        check_interval: narrow(row.get(3)?, "check_interval")?,
        status: parse_column(&status)?,
        last_checked_at: optional_time(row.get::<Option<i64>>(5)?)?,
        created_at: from_millis(row.get(6)?)?,
    })
}

fn metric_from_row(row: &Row) -> Result<Metric, StoreError> {
    let status: String = row.get(2)?;

    Ok(Metric {
        id: row.get(0)?,
        monitor_id: row.get(1)?,
        status: parse_column(&status)?,
        status_code: row
            .get::<Option<i64>>(3)?
            .map(|code| narrow(code, "status_code"))
            .transpose()?,
        response_time_ms: row
            .get::<Option<i64>>(4)?
            .map(|ms| narrow(ms, "response_time_ms"))
            .transpose()?,
        checked_at: from_millis(row.get(5)?)?,
    })
}

fn alert_from_row(row: &Row) -> Result<Alert, StoreError> {
    let status: String = row.get(2)?;

    Ok(Alert {
        id: row.get(0)?,
        monitor_id: row.get(1)?,
        status: parse_column(&status)?,
        issue: row.get(3)?,
        created_at: from_millis(row.get(4)?)?,
        acknowledged_at: optional_time(row.get::<Option<i64>>(5)?)?,
        resolved_at: optional_time(row.get::<Option<i64>>(6)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::create_test_database;

    fn new_monitor(name: &str) -> NewMonitor {
        NewMonitor {
            name: name.to_string(),
            url: format!("https://{name}.example"),
            check_interval: 5,
        }
    }

    #[tokio::test]
    async fn test_register_and_list_monitors_in_registration_order() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;

        let first = database.register_monitor(&new_monitor("first")).await?;
        let second = database.register_monitor(&new_monitor("second")).await?;

        let roster = database.list_monitors().await?;
        assert_eq!(roster.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(roster[0].status, MonitorStatus::Unknown);
        assert!(roster[0].last_checked_at.is_none());
        assert_eq!(roster[0], first);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_status_of_missing_monitor_fails() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;

        let result = database.update_monitor_status(42, MonitorStatus::Up, Utc::now()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_storage_rejects_second_active_alert() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;

        let alert = database.create_alert(monitor.id, "HTTP 500: Internal Server Error").await?;
        assert_eq!(alert.status, AlertStatus::Active);

        let second = database.create_alert(monitor.id, "again").await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));

        let active = database.find_active_alert(monitor.id).await?.unwrap();
        assert_eq!(active.id, alert.id);
        assert_eq!(active.issue, "HTTP 500: Internal Server Error");

        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_leaves_acknowledged_alerts_alone() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;

        let first = database.create_alert(monitor.id, "first outage").await?;
        let acknowledged = database.acknowledge_alert(first.id).await?;
        assert_eq!(acknowledged.status, AlertStatus::Acknowledged);
        assert!(acknowledged.acknowledged_at.is_some());

        // The active slot is free again once the first alert was acknowledged
        let second = database.create_alert(monitor.id, "second outage").await?;

        assert_eq!(database.resolve_active_alerts(monitor.id).await?, 1);
        assert_eq!(database.resolve_active_alerts(monitor.id).await?, 0);

        let alerts = database.list_alerts(Some(monitor.id)).await?;
        let status_of = |id: i64| alerts.iter().find(|a| a.id == id).map(|a| a.status);
        assert_eq!(status_of(first.id), Some(AlertStatus::Acknowledged));
        assert_eq!(status_of(second.id), Some(AlertStatus::Resolved));
        assert!(alerts.iter().find(|a| a.id == second.id).unwrap().resolved_at.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_acknowledge_only_applies_to_active_alerts() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;

        let alert = database.create_alert(monitor.id, "down").await?;
        database.resolve_active_alerts(monitor.id).await?;

        assert!(matches!(database.acknowledge_alert(alert.id).await, Err(StoreError::Conflict(_))));
        assert!(matches!(database.acknowledge_alert(9_999).await, Err(StoreError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_are_returned_newest_first() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;
        let start = Utc::now();

        for (offset, code) in [(0, Some(200)), (1, None), (2, Some(503))] {
            database
                .insert_metric(&NewMetric {
                    monitor_id: monitor.id,
                    status: if code == Some(200) { MonitorStatus::Up } else { MonitorStatus::Down },
                    status_code: code,
                    response_time_ms: Some(10 + offset as u64),
                    checked_at: start + chrono::Duration::seconds(offset),
                })
                .await?;
        }

        let metrics = database.recent_metrics(monitor.id, 2).await?;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].status_code, Some(503));
        assert_eq!(metrics[1].status_code, None);
        assert_eq!(metrics[1].status, MonitorStatus::Down);

        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_monitor_cascades() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;
        database.create_alert(monitor.id, "down").await?;

        assert!(database.delete_monitor(monitor.id).await?);
        assert!(!database.delete_monitor(monitor.id).await?);
        assert!(database.get_monitor(monitor.id).await?.is_none());
        assert!(database.list_alerts(Some(monitor.id)).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_unique_index_reports_unique_violation() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;
        database.create_alert(monitor.id, "down").await?;

        // Bypass the conditional insert so only the index can reject the row
        let conn = database.get_conn().await?;
        let error = conn
            .execute(
                "INSERT INTO alerts (monitor_id, status, issue, created_at) VALUES (?, 'active', 'dup', 0)",
                params![monitor.id],
            )
            .await
            .unwrap_err();
        assert!(StoreError::is_unique_violation(&error), "unexpected error: {error}");

        // A foreign key failure is a constraint error too, but not a conflict
        let error = conn
            .execute(
                "INSERT INTO alerts (monitor_id, status, issue, created_at) VALUES (999, 'resolved', 'x', 0)",
                (),
            )
            .await
            .unwrap_err();
        assert!(!StoreError::is_unique_violation(&error));

        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_columns_are_invalid_rows() -> anyhow::Result<()> {
        let (database, _dir) = create_test_database().await?;
        let monitor = database.register_monitor(&new_monitor("api")).await?;

        let conn = database.get_conn().await?;
        conn.execute(
            "INSERT INTO metrics (monitor_id, status, status_code, response_time_ms, checked_at) VALUES (?, 'up', 70000, 5, 0)",
            params![monitor.id],
        )
        .await?;
        conn.execute("UPDATE monitors SET check_interval = -1 WHERE id = ?", params![monitor.id])
            .await?;
        drop(conn);

        assert!(matches!(
            database.recent_metrics(monitor.id, 1).await,
            Err(StoreError::InvalidRow(_))
        ));
        assert!(matches!(database.get_monitor(monitor.id).await, Err(StoreError::InvalidRow(_))));

        Ok(())
    }
}
