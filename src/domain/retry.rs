//! Exponential backoff retry for chunk requests

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cancel::CancellationToken;
use super::transport::{PartitionRequest, PartitionResponse, Transport, TransportError};

/// Backoff settings. Retryable status codes and the elapsed-time budget are
/// configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_interval_ms: u64,
    /// Upper bound for a single delay
    pub max_interval_ms: u64,
    /// Growth factor between attempts
    pub exponent: f64,
    /// Stop retrying once this much time has passed since the first attempt
    pub max_elapsed_ms: u64,
    /// Random extra delay added to every sleep
    pub jitter_ms: u64,
    pub retry_connection_errors: bool,
    pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 3_000,
            max_interval_ms: 720_000,
            exponent: 1.88,
            max_elapsed_ms: 1_800_000,
            jitter_ms: 1_000,
            retry_connection_errors: true,
            status_codes: vec![502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Never retries
    pub fn disabled() -> Self {
        Self {
            max_elapsed_ms: 0,
            retry_connection_errors: false,
            status_codes: Vec::new(),
            ..Default::default()
        }
    }

    pub fn with_initial_interval(mut self, ms: u64) -> Self {
        self.initial_interval_ms = ms;
        self
    }

    pub fn with_max_interval(mut self, ms: u64) -> Self {
        self.max_interval_ms = ms;
        self
    }

    pub fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn with_max_elapsed(mut self, ms: u64) -> Self {
        self.max_elapsed_ms = ms;
        self
    }

    pub fn with_jitter(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    pub fn with_status_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.status_codes = codes.into();
        self
    }

    pub fn with_retry_connection_errors(mut self, retry: bool) -> Self {
        self.retry_connection_errors = retry;
        self
    }

    /// Delay before retry number `attempt + 1`, without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_interval_ms as f64 * self.exponent.powi(attempt as i32);
        let delay_ms = delay.min(self.max_interval_ms as f64).max(0.0) as u64;

        Duration::from_millis(delay_ms)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };

        let delay = self.delay_for_attempt(attempt) + Duration::from_millis(jitter);
        delay.min(Duration::from_millis(self.max_interval_ms))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    pub fn is_retryable_error(&self, error: &TransportError) -> bool {
        self.retry_connection_errors && error.is_connection_level()
    }
}

/// How a retried send ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Last response received; may still carry a failure status
    Response(PartitionResponse),
    Error(TransportError),
    Cancelled,
}

/// Sends a request with per-request retry, racing every wait against the
/// operation's cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn send(
        &self,
        transport: &dyn Transport,
        request: &PartitionRequest,
        cancel: &CancellationToken,
    ) -> RetryOutcome {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.max_elapsed_ms);
        let mut retries: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                result = transport.send(request.clone()) => result,
            };

            let retryable = match &result {
                Ok(response) => self.config.is_retryable_status(response.status),
                Err(error) => self.config.is_retryable_error(error),
            };

            if !retryable {
                return finish(result);
            }

            if started.elapsed() >= budget {
                if !budget.is_zero() {
                    warn!(retries, "Retry budget exhausted after {:?}", started.elapsed());
                }
                return finish(result);
            }

            retries += 1;
            log_retry(&result, retries);

            let delay = self.config.jittered_delay(retries - 1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn finish(result: Result<PartitionResponse, TransportError>) -> RetryOutcome {
    match result {
        Ok(response) => RetryOutcome::Response(response),
        Err(error) => RetryOutcome::Error(error),
    }
}

fn log_retry(result: &Result<PartitionResponse, TransportError>, attempt: u32) {
    match result {
        Ok(response) => {
            info!(
                status = response.status,
                attempt,
                "Failed to process a request due to API server error with status code {}. \
                 Attempting retry number {} after sleep.",
                response.status,
                attempt
            );
            if !response.body.is_empty() {
                info!("Server message - {}", response.text());
            }
        }
        Err(error) => {
            info!(
                attempt,
                "Failed to process a request due to connection error - {}. \
                 Attempting retry number {} after sleep.",
                error,
                attempt
            );
        }
    }
}
