//! Page retrieval with bounded retries
//!
//! A 200 returns immediately. A 403 or transport error waits an exponential
//! backoff (longer for 403) before the next attempt; any other status waits
//! a short fixed delay. Exhausting the attempts yields a [`FetchFailure`],
//! which callers count rather than propagate.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FetchErrorKind, FetchFailure, TransportError};
use crate::pacing::{Sleeper, ThreadSleeper};
use crate::types::RawDocument;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    /// Base wait after a 403, doubled on each further attempt
    pub blocked_backoff_ms: u64,
    /// Base wait after a transport error, doubled on each further attempt
    pub error_backoff_ms: u64,
    /// Fixed wait after any other non-200 status
    pub status_retry_delay_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 15,
            blocked_backoff_ms: 5_000,
            error_backoff_ms: 3_000,
            status_retry_delay_ms: 2_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// One HTTP GET, no retries
pub trait Transport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a shared ureq agent
pub struct UreqTransport {
    agent: ureq::Agent,
    accept_language: String,
}

impl UreqTransport {
    pub fn new(config: &FetchConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(config.timeout()))
                .user_agent(config.user_agent.as_str())
                .http_status_as_error(false)
                .build(),
        );
        Self {
            agent,
            accept_language: config.accept_language.clone(),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut response = self
            .agent
            .get(url)
            .header("Accept", ACCEPT)
            .header("Accept-Language", self.accept_language.as_str())
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError(format!("failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            body,
            content_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub blocked_backoff: Duration,
    pub error_backoff: Duration,
    pub status_retry_delay: Duration,
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout(),
            blocked_backoff: Duration::from_millis(config.blocked_backoff_ms),
            error_backoff: Duration::from_millis(config.error_backoff_ms),
            status_retry_delay: Duration::from_millis(config.status_retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based)
    pub fn backoff(&self, error: &FetchErrorKind, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        match error {
            blocked if blocked.is_blocked() => self.blocked_backoff.saturating_mul(factor),
            FetchErrorKind::Transport(_) => self.error_backoff.saturating_mul(factor),
            FetchErrorKind::Status(_) => self.status_retry_delay,
        }
    }
}

pub struct Fetcher<T, Z = ThreadSleeper> {
    transport: T,
    sleeper: Z,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, policy, ThreadSleeper)
    }
}

impl<T: Transport, Z: Sleeper> Fetcher<T, Z> {
    pub fn with_sleeper(transport: T, policy: RetryPolicy, sleeper: Z) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, url: &str) -> Result<RawDocument, FetchFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = FetchErrorKind::Transport("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            let error = match self.transport.get(url, self.policy.timeout) {
                Ok(response) if response.status == 200 => {
                    let latency = started.elapsed();
                    debug!(
                        url,
                        attempt,
                        bytes = response.body.len(),
                        latency_ms = latency.as_millis() as u64,
                        "fetched page"
                    );
                    return Ok(RawDocument {
                        url: url.to_string(),
                        body: response.body,
                        status: response.status,
                        latency,
                        attempts: attempt,
                        content_type: response.content_type,
                    });
                }
                Ok(response) => FetchErrorKind::Status(response.status),
                Err(e) => FetchErrorKind::Transport(e.0),
            };

            warn!(url, attempt, max_attempts, error = %error, "fetch attempt failed");

            if attempt < max_attempts {
                self.sleeper.sleep(self.policy.backoff(&error, attempt));
            }
            last = error;
        }

        Err(FetchFailure {
            url: url.to_string(),
            attempts: max_attempts,
            last,
        })
    }
}
