/// Health-check engine building blocks
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS targets (`checker`)
/// - Classifying probe outcomes as up/down (`evaluator`)
/// - Appending metric samples (`recorder`)
/// - Opening and resolving alerts on status changes (`alerts`)
pub mod alerts;
pub mod checker;
pub mod evaluator;
pub mod executor;
pub mod recorder;
pub mod types;

pub use alerts::AlertManager;
pub use checker::{HttpProber, Prober};
pub use evaluator::{Evaluation, evaluate};
pub use executor::MonitoringExecutor;
pub use recorder::MetricRecorder;
pub use types::{AlertAction, CheckResult, MonitorStatus, ProbeResult};
