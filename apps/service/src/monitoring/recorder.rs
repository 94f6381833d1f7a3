use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::types::MonitorStatus;
use crate::database::models::NewMetric;
use crate::database::{Database, StoreError};

/// Appends probe samples to each monitor's time series
pub struct MetricRecorder {
    database: Arc<dyn Database>,
}

impl MetricRecorder {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Append one sample. `checked_at` must be the server clock at check time.
    ///
    /// The error is returned so the caller can count it; it must not stop the
    /// alert reconciliation for the same monitor.
    pub async fn record(
        &self,
        monitor_id: i64,
        status: MonitorStatus,
        status_code: Option<u16>,
        response_time_ms: Option<u64>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let metric = NewMetric { monitor_id, status, status_code, response_time_ms, checked_at };

        self.database.insert_metric(&metric).await.map(|_| ()).inspect_err(|error| {
            warn!(monitor_id, %error, "Failed to record metric");
        })
    }
}
