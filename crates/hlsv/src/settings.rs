//! Configuration for the `hlsv` crate.
//!
//! A single flat [`Settings`] struct covers every fetch source:
//! - HTTP behavior (timeouts, retries, backoff, user agent)
//! - body size cap shared by HTTP and file sources
//!
//! Build it with `Settings::default()` and the consuming setters.

use std::time::Duration;

/// Unified settings for fetch sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Timeout for connecting and for each idle gap between body chunks.
    /// Default: 30 seconds.
    pub request_timeout: Duration,

    /// Maximum number of retry attempts for failed requests.
    /// Default: 2 retries.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    /// Default: 100ms.
    pub retry_base_delay: Duration,

    /// Maximum backoff delay (cap for exponential growth).
    /// Default: 2 seconds.
    pub max_retry_delay: Duration,

    /// Bodies longer than this are truncated.
    /// Default: 1 MiB.
    pub max_body_bytes: usize,

    /// `User-Agent` header sent by the HTTP source.
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(2),
            max_body_bytes: 1024 * 1024,
            user_agent: concat!("hlsv/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound for one whole attempt, body included.
    pub(crate) fn attempt_timeout(&self) -> Duration {
        self.request_timeout
            .saturating_mul(self.max_retries.saturating_add(1))
    }
}
