// src/arbitrage/engine.rs
//! The detection loop: fetch, normalize, scan, score, register, publish.

use crate::arbitrage::registry::OpportunityRegistry;
use crate::arbitrage::scanner::{QuoteBook, SpreadScanner};
use crate::arbitrage::scorer::ProfitabilityScorer;
use crate::config::Config;
use crate::dex::{normalizer, QuoteSource, RawVenueQuote};
use crate::error::Result;
use crate::publisher::{Publisher, PushMessage};
use crate::utils::now_ms;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

pub struct DetectionEngine {
    sources: Vec<Arc<dyn QuoteSource>>,
    book: QuoteBook,
    scanner: SpreadScanner,
    scorer: ProfitabilityScorer,
    registry: Arc<Mutex<OpportunityRegistry>>,
    publisher: Arc<Publisher>,
    cycle_interval: Duration,
    source_timeout: Duration,
    freshness_window_ms: u64,
}

impl DetectionEngine {
    pub fn new(
        config: &Config,
        sources: Vec<Arc<dyn QuoteSource>>,
        registry: Arc<Mutex<OpportunityRegistry>>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            sources,
            book: QuoteBook::new(),
            scanner: SpreadScanner::new(config.freshness_window_ms),
            scorer: ProfitabilityScorer::new(config),
            registry,
            publisher,
            cycle_interval: Duration::from_millis(config.cycle_interval_ms),
            source_timeout: Duration::from_millis(config.source_timeout_ms),
            freshness_window_ms: config.freshness_window_ms,
        }
    }

    /// All sources concurrently, each under the cycle timeout. A timeout
    /// counts against that source's health exactly like a failed fetch; the
    /// other sources' results are unaffected.
    async fn collect_raw_quotes(&self) -> Vec<RawVenueQuote> {
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let timeout = self.source_timeout;
            async move {
                match tokio::time::timeout(timeout, source.fetch_quotes()).await {
                    Ok(Ok(quotes)) => quotes,
                    Ok(Err(e)) => {
                        warn!("⚠️ {} fetch failed: {}", source.name(), e);
                        Vec::new()
                    }
                    Err(_) => {
                        source.health().record_failure();
                        warn!(
                            "⚠️ {} fetch timed out after {:?}",
                            source.name(),
                            timeout
                        );
                        Vec::new()
                    }
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// One full detection cycle. Only registry corruption propagates; every
    /// other failure is contained to the source or quote that caused it.
    pub async fn run_detection_cycle(&self) -> Result<()> {
        let raw_quotes = self.collect_raw_quotes().await;
        debug!("Cycle collected {} raw quotes", raw_quotes.len());

        for raw in raw_quotes {
            match normalizer::normalize(raw) {
                Ok(quote) => self.book.apply(quote),
                Err(e) => warn!("Dropping quote: {}", e),
            }
        }

        let now = now_ms();
        self.book.prune(now, self.freshness_window_ms);
        let candidates = self.scanner.scan(&self.book, now);

        let fresh = {
            let mut registry = self.registry.lock().await;
            registry.sweep(now)?;
            let mut fresh = Vec::new();
            for candidate in &candidates {
                if let Some(opportunity) = self.scorer.score(candidate, now) {
                    if registry.accept(opportunity.clone()) {
                        fresh.push(opportunity);
                    }
                }
            }
            fresh
        };

        // Fan-out happens after the lock is released.
        for opportunity in fresh {
            self.publisher
                .publish(PushMessage::NewOpportunity(opportunity));
        }
        Ok(())
    }

    /// Fixed-interval loop until shutdown. Fatal errors stop the engine;
    /// anything recoverable is logged and the next tick proceeds.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "🚀 Detection engine started ({} sources, {:?} cycle)",
            self.sources.len(),
            self.cycle_interval
        );
        let mut ticker = tokio::time::interval(self.cycle_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_detection_cycle().await {
                        if e.is_fatal() {
                            error!("💥 Fatal engine error: {}", e);
                            return Err(e);
                        }
                        warn!("Cycle error: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    info!("Detection engine stopping");
                    return Ok(());
                }
            }
        }
    }

    pub fn sources(&self) -> &[Arc<dyn QuoteSource>] {
        &self.sources
    }
}
