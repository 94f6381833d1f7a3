//! Input rules for the monitor registration path.
//!
//! The engine trusts stored URLs, so everything that reaches the `monitors`
//! table goes through [`validate_new_monitor`] first.

use thiserror::Error;
use url::Url;

use crate::database::models::NewMonitor;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_URL_LEN: usize = 500;
/// Check interval bounds in minutes
pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

/// First rule a registration broke
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

type Rule = Result<(), String>;

/// HTTP or HTTPS URL with a host, at most [`MAX_URL_LEN`] characters
pub fn validate_http_endpoint(target: &str) -> Rule {
    let target = target.trim();
    if target.is_empty() {
        return Err("URL cannot be empty".into());
    }
    if target.chars().count() > MAX_URL_LEN {
        return Err(format!("URL must be less than {MAX_URL_LEN} characters"));
    }

    let url = Url::parse(target).map_err(|error| {
        if target.contains("://") {
            format!("Invalid URL: {error}")
        } else {
            "URL must include scheme (http:// or https://)".to_string()
        }
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Invalid scheme '{other}'. URL must use HTTP or HTTPS")),
    }

    url.host_str().map(|_| ()).ok_or_else(|| "URL must have a valid host".to_string())
}

/// Letters, digits, spaces, hyphens and underscores; surrounding whitespace ignored
pub fn validate_monitor_name(name: &str) -> Rule {
    let name = name.trim();
    if name.is_empty() {
        return Err("Monitor name is required".into());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Monitor name must be less than {MAX_NAME_LEN} characters"));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '_';
    if !name.chars().all(allowed) {
        return Err(
            "Monitor name can only contain letters, numbers, spaces, hyphens, and underscores".into(),
        );
    }

    Ok(())
}

pub fn validate_interval(minutes: u32) -> Rule {
    if minutes < MIN_INTERVAL_MINUTES {
        Err("Check interval must be at least 1 minute".into())
    } else if minutes > MAX_INTERVAL_MINUTES {
        Err("Check interval cannot exceed 24 hours (1440 minutes)".into())
    } else {
        Ok(())
    }
}

/// Validate and normalize a registration
pub fn validate_new_monitor(
    name: &str,
    url: &str,
    check_interval: u32,
) -> Result<NewMonitor, ValidationError> {
    let tag = |field: &'static str| move |message: String| ValidationError { field, message };

    validate_monitor_name(name).map_err(tag("name"))?;
    validate_http_endpoint(url).map_err(tag("url"))?;
    validate_interval(check_interval).map_err(tag("check_interval"))?;

    Ok(NewMonitor {
        name: name.trim().to_string(),
        url: url.trim().to_string(),
        check_interval,
    })
}
