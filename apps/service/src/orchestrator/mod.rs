/// Orchestrator module - runs one check cycle over the monitor roster
///
/// A cycle loads every monitor, then for each one (concurrently, capped by a
/// semaphore) probes it, records a metric, reconciles its alert and writes the
/// new status back. Per-monitor failures are logged and counted; only a failed
/// roster fetch aborts the cycle.


use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::ChecksConfig;
use crate::database::models::Monitor;
use crate::database::{Database, StoreError};
use crate::monitoring::{
    AlertAction, AlertManager, HttpProber, MetricRecorder, MonitorStatus, MonitoringExecutor,
    Prober,
};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to load monitors: {0}")]
    RosterFetch(#[source] StoreError),
}

/// Aggregate result of one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub checked: usize,
    /// Monitors whose metric, alert and status writes all succeeded
    pub succeeded_count: usize,
    /// Monitors with at least one failed write
    pub failed_to_update_count: usize,
    pub up_count: usize,
    pub down_count: usize,
    pub alerts_created: usize,
    pub alerts_resolved: usize,
    pub timestamp: DateTime<Utc>,
}

impl RunSummary {
    fn new(run_id: Uuid, checked: usize) -> Self {
        Self {
            run_id,
            checked,
            succeeded_count: 0,
            failed_to_update_count: 0,
            up_count: 0,
            down_count: 0,
            alerts_created: 0,
            alerts_resolved: 0,
            timestamp: Utc::now(),
        }
    }

    fn absorb(&mut self, outcome: &MonitorOutcome) {
        if outcome.failures.is_empty() {
            self.succeeded_count += 1;
        } else {
            self.failed_to_update_count += 1;
        }

        match outcome.status {
            MonitorStatus::Up => self.up_count += 1,
            MonitorStatus::Down => self.down_count += 1,
            MonitorStatus::Unknown => {}
        }

        match outcome.alert_action {
            Some(AlertAction::Created) => self.alerts_created += 1,
            Some(AlertAction::Resolved) => self.alerts_resolved += 1,
            Some(AlertAction::None) | None => {}
        }
    }
}

/// Side effect that failed while processing a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    Metric,
    Alert,
    Status,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailure::Metric => f.write_str("metric"),
            WriteFailure::Alert => f.write_str("alert"),
            WriteFailure::Status => f.write_str("status"),
        }
    }
}

/// What happened to a single monitor during a cycle
#[derive(Debug, Clone)]
pub struct MonitorOutcome {
    pub monitor_id: i64,
    pub status: MonitorStatus,
    /// `None` when alert reconciliation itself failed
    pub alert_action: Option<AlertAction>,
    pub failures: Vec<WriteFailure>,
}

/// Everything a per-monitor task needs, cheap to clone into it
#[derive(Clone)]
struct CheckContext {
    database: Arc<dyn Database>,
    executor: Arc<MonitoringExecutor>,
    recorder: Arc<MetricRecorder>,
    alerts: Arc<AlertManager>,
}

impl CheckContext {
    async fn check_monitor(&self, monitor: Monitor) -> MonitorOutcome {
        let result = self.executor.execute_check(monitor.id, &monitor.url).await;
        let checked_at = Utc::now();
        let mut failures = Vec::new();

        // The three writes are independent; one failing never skips the others.
        if self
            .recorder
            .record(
                monitor.id,
                result.status,
                result.probe.status_code,
                Some(result.probe.elapsed_ms),
                checked_at,
            )
            .await
            .is_err()
        {
            failures.push(WriteFailure::Metric);
        }

        // Alert state and stored status must come from the same check, so both
        // writes happen under the monitor's lock.
        let guard = self.alerts.lock_monitor(monitor.id).await;

        let alert_action = match self
            .alerts
            .reconcile_held(&guard, monitor.status, result.status, result.issue.as_deref())
            .await
        {
            Ok(action) => Some(action),
            Err(error) => {
                error!(monitor_id = monitor.id, %error, "Failed to reconcile alert");
                failures.push(WriteFailure::Alert);
                None
            }
        };

        if let Err(error) =
            self.database.update_monitor_status(monitor.id, result.status, checked_at).await
        {
            error!(monitor_id = monitor.id, %error, "Failed to update monitor status");
            failures.push(WriteFailure::Status);
        }
        drop(guard);

        if result.is_transition_from(monitor.status) {
            info!(
                monitor_id = monitor.id,
                name = %monitor.name,
                from = %monitor.status,
                to = %result.status,
                issue = result.issue.as_deref().unwrap_or(""),
                "Monitor status changed"
            );
        } else {
            debug!(monitor_id = monitor.id, status = %result.status, "Monitor status unchanged");
        }

        if !failures.is_empty() {
            let failed: Vec<String> = failures.iter().map(ToString::to_string).collect();
            warn!(monitor_id = monitor.id, failed = %failed.join(","), "Monitor only partially updated");
        }

        MonitorOutcome { monitor_id: monitor.id, status: result.status, alert_action, failures }
    }
}

/// Drives check cycles. One instance can serve many cycles; nothing about
/// monitor state is cached between them.
pub struct CheckOrchestrator {
    context: CheckContext,
    /// Caps simultaneous probes across every cycle running on this instance
    slots: Arc<Semaphore>,
}

impl CheckOrchestrator {
    pub fn new(database: Arc<dyn Database>, prober: Arc<dyn Prober>, concurrency: usize) -> Self {
        let context = CheckContext {
            executor: Arc::new(MonitoringExecutor::new(prober)),
            recorder: Arc::new(MetricRecorder::new(database.clone())),
            alerts: Arc::new(AlertManager::new(database.clone())),
            database,
        };

        Self { context, slots: Arc::new(Semaphore::new(concurrency.max(1))) }
    }

    /// Production wiring: HTTP prober configured from `[checks]`
    pub fn from_config(
        database: Arc<dyn Database>,
        checks: &ChecksConfig,
    ) -> Result<Self, reqwest::Error> {
        let prober = HttpProber::new(checks.timeout(), &checks.user_agent)?;
        debug!(
            timeout_ms = prober.timeout().as_millis() as u64,
            concurrency = checks.concurrency,
            "HTTP prober ready"
        );
        Ok(Self::new(database, Arc::new(prober), checks.concurrency))
    }

    /// Run one full pass over the roster
    pub async fn run_cycle(&self) -> Result<RunSummary, CycleError> {
        let run_id = Uuid::new_v4();
        self.run_cycle_inner(run_id).instrument(info_span!("cycle", %run_id)).await
    }

    async fn run_cycle_inner(&self, run_id: Uuid) -> Result<RunSummary, CycleError> {
        let monitors = self.context.database.list_monitors().await.map_err(|error| {
            error!(%error, "Error fetching monitors");
            CycleError::RosterFetch(error)
        })?;

        info!("Starting health checks for {} monitors", monitors.len());
        let mut summary = RunSummary::new(run_id, monitors.len());

        let mut tasks = JoinSet::new();
        for monitor in monitors {
            let context = self.context.clone();
            let slots = self.slots.clone();
            let span = info_span!("monitor", monitor_id = monitor.id, url = %monitor.url);

            tasks.spawn(
                async move {
                    // The semaphore is never closed, so this only waits for a slot
                    let _permit = slots.acquire_owned().await.ok();
                    context.check_monitor(monitor).await
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.absorb(&outcome),
                Err(error) => {
                    error!(%error, "Monitor check task failed");
                    summary.failed_to_update_count += 1;
                }
            }
        }

        summary.timestamp = Utc::now();
        info!(
            checked = summary.checked,
            succeeded = summary.succeeded_count,
            failed_to_update = summary.failed_to_update_count,
            alerts_created = summary.alerts_created,
            alerts_resolved = summary.alerts_resolved,
            "Health check cycle finished"
        );

        Ok(summary)
    }
}
