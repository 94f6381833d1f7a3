use std::sync::Arc;

use tracing::debug;

use super::checker::Prober;
use super::evaluator::evaluate;
use super::types::CheckResult;

/// Monitoring executor - probes one target and classifies the outcome
pub struct MonitoringExecutor {
    prober: Arc<dyn Prober>,
}

impl MonitoringExecutor {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Execute a monitoring check. Never fails; transport errors become a down result.
    pub async fn execute_check(&self, monitor_id: i64, url: &str) -> CheckResult {
        let probe = self.prober.probe(url).await;
        let evaluation = evaluate(&probe);

        debug!(
            monitor_id,
            url,
            status_code = ?probe.status_code,
            elapsed_ms = probe.elapsed_ms,
            status = %evaluation.status,
            "Probe finished"
        );

        CheckResult { monitor_id, probe, status: evaluation.status, issue: evaluation.issue }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{MonitorStatus, ProbeResult};

    struct FixedProber(ProbeResult);

    #[async_trait::async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _url: &str) -> ProbeResult {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_execute_check_classifies_probe() {
        let executor =
            MonitoringExecutor::new(Arc::new(FixedProber(ProbeResult::response(200, 120))));
        let result = executor.execute_check(1, "https://ok.example").await;

        assert_eq!(result.monitor_id, 1);
        assert_eq!(result.status, MonitorStatus::Up);
        assert_eq!(result.probe.elapsed_ms, 120);
        assert!(result.issue.is_none());
        assert!(result.is_transition_from(MonitorStatus::Unknown));
        assert!(!result.is_transition_from(MonitorStatus::Up));

        let executor = MonitoringExecutor::new(Arc::new(FixedProber(ProbeResult::failure(
            "Request timed out after 30000ms",
            30_000,
        ))));
        let result = executor.execute_check(1, "https://ok.example").await;

        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.issue.as_deref(), Some("Request timed out after 30000ms"));
    }
}
