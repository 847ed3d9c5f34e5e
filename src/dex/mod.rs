//! Quote source adapters.
//!
//! Each adapter wraps one external price source behind the `QuoteSource`
//! contract: it enforces its own rate limit, retries transient failures with
//! bounded backoff, and tracks its own connection health. A failing source
//! returns an error for the cycle; it never takes the pipeline down.

pub mod clients;
pub mod normalizer;

use crate::error::{ArbError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A venue observation before normalization. `price` is quote-asset units per
/// base-asset unit in whatever orientation the venue reported.
#[derive(Debug, Clone)]
pub struct RawVenueQuote {
    pub venue: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub price: f64,
    pub available_size: f64,
    pub observed_at_ms: u64,
}

/// Point-in-time liveness snapshot for one source, served to subscribers in
/// the `connection_status` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub healthy: bool,
    pub last_success_ms: Option<u64>,
    pub consecutive_failures: u32,
}

/// Shared liveness state owned by one adapter. Lock-free so the engine can
/// record a timeout without touching the adapter's internals.
#[derive(Debug)]
pub struct SourceHealth {
    unhealthy_after: u32,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    last_success_ms: AtomicU64,
}

impl SourceHealth {
    pub fn new(unhealthy_after: u32) -> Self {
        Self {
            unhealthy_after: unhealthy_after.max(1),
            healthy: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            last_success_ms: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, now_ms: u64) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.last_success_ms.store(now_ms, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.unhealthy_after {
            self.healthy.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ConnectionHealth {
        let last = self.last_success_ms.load(Ordering::SeqCst);
        ConnectionHealth {
            healthy: self.healthy.load(Ordering::SeqCst),
            last_success_ms: if last == 0 { None } else { Some(last) },
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
        }
    }
}

/// Minimum inter-call spacing for one source. Callers queue behind the lock,
/// so concurrent fetches against the same source are serialized.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// The uniform contract every venue adapter implements: produce quotes for
/// the configured pairs from one venue.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Venue name as it appears on quotes and in health broadcasts.
    fn name(&self) -> &str;

    /// Fetch the current quotes. Fails with `SourceUnavailable` after the
    /// adapter's internal retries are exhausted.
    async fn fetch_quotes(&self) -> Result<Vec<RawVenueQuote>>;

    /// Liveness state, updated by the adapter on every fetch outcome and by
    /// the engine when a fetch exceeds its cycle timeout.
    fn health(&self) -> &SourceHealth;
}

/// Builds the enabled source adapters from configuration.
pub fn get_all_sources(config: &crate::config::Config) -> Vec<Arc<dyn QuoteSource>> {
    let sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(clients::jupiter::JupiterSource::new(config)),
        Arc::new(clients::raydium::RaydiumSource::new(config)),
        Arc::new(clients::orca::OrcaSource::new(config)),
    ];
    log::info!(
        "Initialized {} quote sources: {}",
        sources.len(),
        sources
            .iter()
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    sources
}

/// Fetch guard shared by the HTTP adapters: rate limit, then retry transient
/// failures, recording the outcome on the health tracker.
pub(crate) async fn guarded_fetch<F, Fut>(
    name: &str,
    limiter: &RateLimiter,
    retry: &crate::error::RetryPolicy,
    health: &SourceHealth,
    fetch_once: F,
) -> Result<Vec<RawVenueQuote>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<RawVenueQuote>>>,
{
    limiter.acquire().await;
    match retry.execute(fetch_once).await {
        Ok(quotes) => {
            health.record_success(crate::utils::now_ms());
            Ok(quotes)
        }
        Err(e) => {
            health.record_failure();
            Err(ArbError::SourceUnavailable(format!("{}: {}", name, e)))
        }
    }
}
