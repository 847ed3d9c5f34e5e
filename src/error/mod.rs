use log::{debug, error, info, warn};
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, Error)]
pub enum ArbError {
    /// A quote source could not be reached or returned an error status.
    #[error("Source Unavailable: {0}")]
    SourceUnavailable(String),

    /// A venue payload failed normalization (non-positive price/size, bad pair).
    #[error("Invalid Quote: {0}")]
    InvalidQuote(String),

    /// A quote is older than the freshness window. Not an error condition for
    /// the pipeline, but useful for callers that want to surface the reason.
    #[error("Stale Quote: {0}")]
    StaleQuote(String),

    /// The registry observed an entry violating its own invariants. Fatal.
    #[error("Registry Corruption: {0}")]
    RegistryCorruption(String),

    /// Network/connectivity issues below the source-adapter level.
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Parsing errors for venue payloads.
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Timeout errors for operations
    #[error("Timeout Error: {0}")]
    TimeoutError(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Publisher/subscriber channel errors
    #[error("Publish Error: {0}")]
    PublishError(String),
}

impl From<serde_json::Error> for ArbError {
    fn from(err: serde_json::Error) -> Self {
        ArbError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for ArbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArbError::TimeoutError(format!("HTTP request timed out: {}", err))
        } else {
            ArbError::NetworkError(format!("HTTP error: {}", err))
        }
    }
}

impl From<anyhow::Error> for ArbError {
    fn from(err: anyhow::Error) -> Self {
        ArbError::SourceUnavailable(format!("{}", err))
    }
}

impl ArbError {
    /// Determines if an error is recoverable through retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ArbError::SourceUnavailable(_) => true,
            ArbError::NetworkError(_) => true,
            ArbError::TimeoutError(_) => true,
            ArbError::StaleQuote(_) => true, // A fresher quote may arrive next cycle
            ArbError::InvalidQuote(_) => false, // Malformed payloads won't fix themselves
            ArbError::ParseError(_) => false,
            ArbError::ConfigError(_) => false,
            ArbError::PublishError(_) => false,
            ArbError::RegistryCorruption(_) => false, // Fatal by design
        }
    }

    /// True for the one error class that must take the process down rather
    /// than let it serve inconsistent state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArbError::RegistryCorruption(_))
    }
}

/// Retry policy with exponential backoff and jitter, used by the source
/// adapters for transient network failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Calculate delay for a given attempt (exponential backoff plus jitter).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let delay_ms = self.base_delay.as_millis() * (2_u128.pow(attempt - 1));
        let delay_ms = delay_ms.min(self.max_delay.as_millis()) as u64;
        let jitter_ms = if delay_ms >= 4 {
            rand::thread_rng().gen_range(0..=delay_ms / 4)
        } else {
            0
        };
        let delay = Duration::from_millis(delay_ms + jitter_ms);

        debug!("Retry attempt {}: delay = {:?}", attempt, delay);
        delay
    }

    /// Execute operation with retry logic.
    pub async fn execute<F, T, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                sleep(self.delay_for_attempt(attempt)).await;
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_recoverable() {
                        warn!("Non-retryable error on attempt {}: {}", attempt + 1, e);
                        return Err(e);
                    }
                    warn!("Attempt {} failed: {} (retrying...)", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        error!("All {} retry attempts failed", self.max_attempts);
        Err(last_error
            .unwrap_or_else(|| ArbError::SourceUnavailable("Max retries exceeded".to_string())))
    }
}

pub type Result<T> = std::result::Result<T, ArbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fatal_classification() {
        assert!(ArbError::RegistryCorruption("dup".into()).is_fatal());
        assert!(!ArbError::SourceUnavailable("down".into()).is_fatal());
        assert!(!ArbError::InvalidQuote("bad".into()).is_recoverable());
        assert!(ArbError::TimeoutError("slow".into()).is_recoverable());
    }

    #[test]
    fn backoff_is_bounded() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        for attempt in 1..10 {
            // max delay plus 25% jitter
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ArbError::NetworkError("flaky".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_aborts_on_non_recoverable() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let calls = AtomicU32::new(0);

        let result: Result<u32> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ArbError::InvalidQuote("negative price".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
