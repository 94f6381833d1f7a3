//! Alert lifecycle driven by monitor status.
//!
//! Per monitor the alert is either absent, `active`, or closed (`resolved` by
//! this module, `acknowledged` by an operator). A down reading opens an alert
//! only when none is active; an up reading resolves whatever is active.
//!
//! The find-then-create sequence, together with the caller's status write, is
//! a critical section per monitor id. Inside one process it is serialized by
//! an async mutex per monitor ([`AlertManager::lock_monitor`]); across
//! processes the conditional insert and the partial unique index on
//! `alerts(monitor_id) WHERE status = 'active'` make the losing writer observe
//! a conflict, which is treated as "already active".

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::evaluator::FALLBACK_ISSUE;
use super::types::{AlertAction, MonitorStatus};
use crate::database::{Database, StoreError};

type LockMap = SyncMutex<HashMap<i64, Arc<Mutex<()>>>>;

pub struct AlertManager {
    database: Arc<dyn Database>,
    /// One lock per monitor; different monitors never contend
    locks: LockMap,
}

/// Exclusive hold on one monitor's alert and status writes.
///
/// The map entry is pruned on drop once no other task holds or waits on it.
pub struct MonitorGuard<'a> {
    locks: &'a LockMap,
    monitor_id: i64,
    held: Option<OwnedMutexGuard<()>>,
}

impl MonitorGuard<'_> {
    pub fn monitor_id(&self) -> i64 {
        self.monitor_id
    }
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex first so its Arc count only reflects waiters
        drop(self.held.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.monitor_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.monitor_id);
        }
    }
}

impl AlertManager {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database, locks: SyncMutex::new(HashMap::new()) }
    }

    /// Wait for exclusive access to `monitor_id`. Hold the guard across every
    /// write that must stay consistent with the alert state.
    pub async fn lock_monitor(&self, monitor_id: i64) -> MonitorGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(monitor_id).or_default().clone()
        };

        MonitorGuard { locks: &self.locks, monitor_id, held: Some(lock.lock_owned().await) }
    }

    /// Bring the alert store in line with the monitor's new status
    pub async fn reconcile(
        &self,
        monitor_id: i64,
        previous_status: MonitorStatus,
        new_status: MonitorStatus,
        issue: Option<&str>,
    ) -> Result<AlertAction, StoreError> {
        let guard = self.lock_monitor(monitor_id).await;
        self.reconcile_held(&guard, previous_status, new_status, issue).await
    }

    /// [`reconcile`](Self::reconcile) for a caller already holding the monitor's guard
    pub async fn reconcile_held(
        &self,
        guard: &MonitorGuard<'_>,
        previous_status: MonitorStatus,
        new_status: MonitorStatus,
        issue: Option<&str>,
    ) -> Result<AlertAction, StoreError> {
        self.reconcile_locked(guard.monitor_id(), previous_status, new_status, issue).await
    }

    async fn reconcile_locked(
        &self,
        monitor_id: i64,
        previous_status: MonitorStatus,
        new_status: MonitorStatus,
        issue: Option<&str>,
    ) -> Result<AlertAction, StoreError> {
        match new_status {
            MonitorStatus::Down => {
                if let Some(existing) = self.database.find_active_alert(monitor_id).await? {
                    debug!(monitor_id, alert_id = existing.id, "Alert already active");
                    return Ok(AlertAction::None);
                }

                let issue = issue.filter(|text| !text.trim().is_empty()).unwrap_or(FALLBACK_ISSUE);

                match self.database.create_alert(monitor_id, issue).await {
                    Ok(alert) => {
                        info!(
                            monitor_id,
                            alert_id = alert.id,
                            previous = %previous_status,
                            issue,
                            "Created alert"
                        );
                        Ok(AlertAction::Created)
                    }
                    Err(StoreError::Conflict(reason)) => {
                        debug!(monitor_id, %reason, "Another writer opened the alert first");
                        Ok(AlertAction::None)
                    }
                    Err(error) => Err(error),
                }
            }
            MonitorStatus::Up => {
                let resolved = self.database.resolve_active_alerts(monitor_id).await?;
                if resolved == 0 {
                    return Ok(AlertAction::None);
                }

                info!(monitor_id, resolved, previous = %previous_status, "Resolved alerts");
                Ok(AlertAction::Resolved)
            }
            MonitorStatus::Unknown => Ok(AlertAction::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseImpl;
    use crate::database::models::{AlertStatus, NewMonitor};
    use crate::database::test_support::create_test_database;
    use tokio::task::JoinSet;

    async fn setup() -> anyhow::Result<(Arc<DatabaseImpl>, tempfile::TempDir, i64)> {
        let (database, dir) = create_test_database().await?;
        let monitor = database
            .register_monitor(&NewMonitor {
                name: "api".into(),
                url: "https://api.example".into(),
                check_interval: 1,
            })
            .await?;
        Ok((database, dir, monitor.id))
    }

    #[tokio::test]
    async fn test_repeated_down_creates_one_alert() -> anyhow::Result<()> {
        let (database, _dir, id) = setup().await?;
        let manager = AlertManager::new(database.clone());

        let actions = [
            manager.reconcile(id, MonitorStatus::Up, MonitorStatus::Down, Some("HTTP 503: Service Unavailable")).await?,
            manager.reconcile(id, MonitorStatus::Down, MonitorStatus::Down, Some("timed out")).await?,
            manager.reconcile(id, MonitorStatus::Down, MonitorStatus::Down, None).await?,
        ];
        assert_eq!(actions, [AlertAction::Created, AlertAction::None, AlertAction::None]);

        let alerts = database.list_alerts(Some(id)).await?;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].issue, "HTTP 503: Service Unavailable");

        Ok(())
    }

    #[tokio::test]
    async fn test_up_resolves_active_alert_once() -> anyhow::Result<()> {
        let (database, _dir, id) = setup().await?;
        let manager = AlertManager::new(database.clone());

        manager.reconcile(id, MonitorStatus::Unknown, MonitorStatus::Down, Some("boom")).await?;
        let action = manager.reconcile(id, MonitorStatus::Down, MonitorStatus::Up, None).await?;
        assert_eq!(action, AlertAction::Resolved);

        let action = manager.reconcile(id, MonitorStatus::Up, MonitorStatus::Up, None).await?;
        assert_eq!(action, AlertAction::None);

        assert!(database.find_active_alert(id).await?.is_none());
        assert_eq!(database.list_alerts(Some(id)).await?[0].status, AlertStatus::Resolved);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_issue_falls_back() -> anyhow::Result<()> {
        let (database, _dir, id) = setup().await?;
        let manager = AlertManager::new(database.clone());

        manager.reconcile(id, MonitorStatus::Up, MonitorStatus::Down, Some("  ")).await?;
        assert_eq!(database.find_active_alert(id).await?.unwrap().issue, FALLBACK_ISSUE);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_reconciles_keep_single_active_alert() -> anyhow::Result<()> {
        let (database, _dir, id) = setup().await?;
        let manager = Arc::new(AlertManager::new(database.clone()));

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let manager = manager.clone();
            tasks.spawn(async move {
                manager.reconcile(id, MonitorStatus::Up, MonitorStatus::Down, Some("down")).await
            });
        }

        let mut created = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined?? == AlertAction::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(database.list_alerts(Some(id)).await?.len(), 1);
        assert!(manager.locks.lock().unwrap().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_separate_managers_rely_on_storage_guard() -> anyhow::Result<()> {
        let (database, _dir, id) = setup().await?;

        // Two managers share no locks, like two overlapping processes
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let manager = AlertManager::new(database.clone());
            tasks.spawn(async move {
                manager.reconcile(id, MonitorStatus::Up, MonitorStatus::Down, Some("down")).await
            });
        }

        let mut created = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined?? == AlertAction::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(database.list_alerts(Some(id)).await?.len(), 1);

        Ok(())
    }
}
