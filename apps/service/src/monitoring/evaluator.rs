use reqwest::StatusCode;

use super::types::{MonitorStatus, ProbeResult};

/// Issue text used when a probe is down without any usable reason
pub const FALLBACK_ISSUE: &str = "Service is down";

/// Status derived from a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: MonitorStatus,
    /// Only populated when `status` is down
    pub issue: Option<String>,
}

/// Classify a probe. Up only for a received 2xx response.
pub fn evaluate(probe: &ProbeResult) -> Evaluation {
    match probe.status_code {
        Some(code) if (200..=299).contains(&code) => {
            Evaluation { status: MonitorStatus::Up, issue: None }
        }
        Some(code) => Evaluation {
            status: MonitorStatus::Down,
            issue: Some(format!("HTTP {code}: {}", reason_phrase(code))),
        },
        None => Evaluation {
            status: MonitorStatus::Down,
            issue: Some(
                probe
                    .error
                    .clone()
                    .filter(|error| !error.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_ISSUE.to_string()),
            ),
        },
    }
}

fn reason_phrase(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown Status")
}
