// src/arbitrage/scanner.rs
//! Quote book and cross-venue spread scan.

use crate::arbitrage::types::{Quote, Spread, SpreadCandidate};
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};
use std::collections::HashMap;

/// Latest quote per `(pair, venue)`. Writes supersede, never mutate; the scan
/// reads a consistent per-entry snapshot without a global lock.
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: DashMap<(String, String), Quote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, quote: Quote) {
        let key = (quote.pair.clone(), quote.venue.clone());
        trace!(
            "Book update {} @ {}: {:.8}",
            quote.pair,
            quote.venue,
            quote.price
        );
        self.quotes.insert(key, quote);
    }

    /// Drops quotes older than the freshness window so a venue that stops
    /// responding cannot keep feeding the scan stale prices.
    pub fn prune(&self, now_ms: u64, freshness_window_ms: u64) -> usize {
        let before = self.quotes.len();
        self.quotes
            .retain(|_, quote| quote.is_fresh(now_ms, freshness_window_ms));
        before - self.quotes.len()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Fresh quotes grouped by pair, each group sorted by venue name so the
    /// scan output is deterministic for a given book state.
    fn fresh_by_pair(&self, now_ms: u64, freshness_window_ms: u64) -> HashMap<String, Vec<Quote>> {
        let mut by_pair: HashMap<String, Vec<Quote>> = HashMap::new();
        for entry in self.quotes.iter() {
            let quote = entry.value();
            if quote.is_fresh(now_ms, freshness_window_ms) {
                by_pair
                    .entry(quote.pair.clone())
                    .or_default()
                    .push(quote.clone());
            }
        }
        for quotes in by_pair.values_mut() {
            quotes.sort_by(|a, b| a.venue.cmp(&b.venue));
        }
        by_pair
    }
}

/// Finds strictly positive cross-venue spreads among fresh quotes.
#[derive(Debug, Clone)]
pub struct SpreadScanner {
    freshness_window_ms: u64,
}

impl SpreadScanner {
    pub fn new(freshness_window_ms: u64) -> Self {
        Self {
            freshness_window_ms,
        }
    }

    /// Scans every ordered venue pair per trading pair. Equal prices produce
    /// nothing; the sell side must be strictly above the buy side.
    pub fn scan(&self, book: &QuoteBook, now_ms: u64) -> Vec<SpreadCandidate> {
        let by_pair = book.fresh_by_pair(now_ms, self.freshness_window_ms);
        let mut candidates = Vec::new();

        for (pair, quotes) in by_pair.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            if quotes.len() < 2 {
                continue;
            }
            for (buy, sell) in quotes.iter().cartesian_product(quotes.iter()) {
                if buy.venue == sell.venue || sell.price <= buy.price {
                    continue;
                }
                let spread_pct = (sell.price - buy.price) / buy.price * 100.0;
                debug!(
                    "Spread {} {} -> {}: {:.4}%",
                    pair, buy.venue, sell.venue, spread_pct
                );
                candidates.push(SpreadCandidate {
                    spread: Spread {
                        pair: pair.clone(),
                        buy_venue: buy.venue.clone(),
                        buy_price: buy.price,
                        sell_venue: sell.venue.clone(),
                        sell_price: sell.price,
                        spread_pct,
                    },
                    buy_size: buy.available_size,
                    sell_size: sell.available_size,
                });
            }
        }
        candidates
    }
}
