use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Derived health of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
            MonitorStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(MonitorStatus::Up),
            "down" => Ok(MonitorStatus::Down),
            "unknown" => Ok(MonitorStatus::Unknown),
            other => Err(format!("unknown monitor status '{other}'")),
        }
    }
}

/// Raw outcome of one probe, before any up/down classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// HTTP status code, present whenever a response was received
    pub status_code: Option<u16>,

    /// Milliseconds from dispatch to response or failure
    pub elapsed_ms: u64,

    /// Transport failure reason (timeout, refused connection, TLS, ...)
    pub error: Option<String>,
}

impl ProbeResult {
    /// A response came back with `status_code`
    pub fn response(status_code: u16, elapsed_ms: u64) -> Self {
        Self { status_code: Some(status_code), elapsed_ms, error: None }
    }

    /// No response; the request failed at the transport level
    pub fn failure(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self { status_code: None, elapsed_ms, error: Some(error.into()) }
    }
}

/// What the alert manager did for a monitor during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    None,
    Created,
    Resolved,
}

/// Classified result of checking one monitor
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub monitor_id: i64,
    pub probe: ProbeResult,
    pub status: MonitorStatus,
    pub issue: Option<String>,
}

impl CheckResult {
    /// Whether this result changes the status the monitor had before the check
    pub fn is_transition_from(&self, previous: MonitorStatus) -> bool {
        self.status != previous
    }
}
