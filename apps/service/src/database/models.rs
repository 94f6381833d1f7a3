use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::StoreError;
use crate::monitoring::types::MonitorStatus;

/// Monitor model - a registered HTTP(S) endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Minutes between checks, 1..=1440
    pub check_interval: u32,
    pub status: MonitorStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A monitor that passed registration validation but is not stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMonitor {
    pub name: String,
    pub url: String,
    pub check_interval: u32,
}

/// Immutable sample appended once per probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: i64,
    pub monitor_id: i64,
    pub status: MonitorStatus,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// Metric row before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetric {
    pub monitor_id: i64,
    pub status: MonitorStatus,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status '{other}'")),
        }
    }
}

/// Down-state incident for a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub monitor_id: i64,
    pub status: AlertStatus,
    pub issue: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Timestamps are stored as Unix milliseconds
pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidRow(format!("timestamp out of range: {millis}")))
}

pub(crate) fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T, StoreError> {
    value.parse().map_err(StoreError::InvalidRow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion_keeps_precision() {
        let now = DateTime::from_timestamp_millis(1_760_000_000_123).unwrap();
        assert_eq!(from_millis(to_millis(now)).unwrap(), now);
    }

    #[test]
    fn test_unknown_status_column_is_rejected() {
        assert!(parse_column::<AlertStatus>("paused").is_err());
        assert_eq!(parse_column::<MonitorStatus>("down").unwrap(), MonitorStatus::Down);
    }
}
