use std::error::Error as StdError;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use super::types::ProbeResult;

/// Hard upper bound for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs one outbound check against a target.
///
/// Implementations never fail: transport problems are reported inside the
/// returned [`ProbeResult`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// HTTP/HTTPS prober issuing a single GET
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();

        // The client timeout covers reqwest's own phases; this one also bounds DNS stalls.
        let outcome = timeout(self.timeout, self.client.get(url).send()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => ProbeResult::response(response.status().as_u16(), elapsed_ms),
            Ok(Err(error)) => ProbeResult::failure(describe_error(&error, self.timeout), elapsed_ms),
            Err(_) => ProbeResult::failure(timed_out(self.timeout), elapsed_ms),
        }
    }
}

fn timed_out(limit: Duration) -> String {
    format!("Request timed out after {}ms", limit.as_millis())
}

/// Flatten a reqwest error and its causes into one line
fn describe_error(error: &reqwest::Error, limit: Duration) -> String {
    if error.is_timeout() {
        return timed_out(limit);
    }

    let mut message = if error.is_connect() {
        "Connection failed".to_string()
    } else if error.is_redirect() {
        "Redirect policy violated".to_string()
    } else if error.is_builder() {
        "Invalid request".to_string()
    } else {
        "Request failed".to_string()
    };

    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
