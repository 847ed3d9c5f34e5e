// src/arbitrage/registry.rs
//! Single-writer store of live opportunities plus process-wide stats.
//!
//! The registry is plain owned state behind the engine's mutex; all mutation
//! happens on the detection cycle. Re-detections of the same logical
//! opportunity refresh it in place instead of accumulating duplicates.

use crate::arbitrage::types::{Opportunity, SystemStats};
use crate::error::{ArbError, Result};
use log::{debug, error, info};
use std::collections::{HashMap, VecDeque};

/// Profit samples retained for the rolling average.
const RECENT_PROFIT_WINDOW: usize = 100;

#[derive(Debug)]
pub struct OpportunityRegistry {
    opportunities: HashMap<String, Opportunity>,
    started_at_ms: u64,
    total_detected: u64,
    recent_profits: VecDeque<f64>,
    pair_counts: HashMap<String, u64>,
    best_profit: f64,
    last_opportunity_ms: u64,
}

impl OpportunityRegistry {
    pub fn new(started_at_ms: u64) -> Self {
        Self {
            opportunities: HashMap::new(),
            started_at_ms,
            total_detected: 0,
            recent_profits: VecDeque::with_capacity(RECENT_PROFIT_WINDOW),
            pair_counts: HashMap::new(),
            best_profit: 0.0,
            last_opportunity_ms: 0,
        }
    }

    /// Inserts or refreshes an opportunity. Returns `true` when the id was
    /// not already live; only those count toward the detection totals, so a
    /// spread that persists across cycles is tallied once.
    pub fn accept(&mut self, opportunity: Opportunity) -> bool {
        let is_new = !self.opportunities.contains_key(&opportunity.id);
        self.last_opportunity_ms = opportunity.detected_at_ms;

        if is_new {
            self.total_detected += 1;
            if self.recent_profits.len() == RECENT_PROFIT_WINDOW {
                self.recent_profits.pop_front();
            }
            self.recent_profits.push_back(opportunity.profit_pct);
            *self.pair_counts.entry(opportunity.pair.clone()).or_insert(0) += 1;
            if opportunity.profit_pct > self.best_profit {
                self.best_profit = opportunity.profit_pct;
            }
            opportunity.log_summary();
        } else {
            debug!("Refreshed live opportunity {}", opportunity.id);
        }

        self.opportunities
            .insert(opportunity.id.clone(), opportunity);
        is_new
    }

    /// Validates every live entry and evicts the expired ones. A structurally
    /// invalid entry means the store itself can no longer be trusted, which
    /// is fatal.
    pub fn sweep(&mut self, now_ms: u64) -> Result<usize> {
        for opportunity in self.opportunities.values() {
            if !opportunity.validate() {
                error!("Registry invariant violated by {:?}", opportunity);
                return Err(ArbError::RegistryCorruption(format!(
                    "invalid opportunity {}",
                    opportunity.id
                )));
            }
        }
        let before = self.opportunities.len();
        self.opportunities.retain(|_, o| o.is_live(now_ms));
        let expired = before - self.opportunities.len();
        if expired > 0 {
            info!("⏳ Expired {} opportunities", expired);
        }
        Ok(expired)
    }

    /// Opportunities live at `now_ms`, newest first. Expired entries are
    /// filtered here as well as in `sweep()`: reads happen on subscriber
    /// connects between detection cycles, and an expired opportunity must
    /// never be served regardless of when the last sweep ran.
    pub fn snapshot(&self, now_ms: u64) -> Vec<Opportunity> {
        let mut live: Vec<Opportunity> = self
            .opportunities
            .values()
            .filter(|o| o.is_live(now_ms))
            .cloned()
            .collect();
        live.sort_by(|a, b| {
            b.detected_at_ms
                .cmp(&a.detected_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        live
    }

    pub fn live_count(&self) -> usize {
        self.opportunities.len()
    }

    pub fn stats(&self, now_ms: u64) -> SystemStats {
        let uptime_seconds = now_ms.saturating_sub(self.started_at_ms) as f64 / 1_000.0;
        let avg_profit_percentage = if self.recent_profits.is_empty() {
            0.0
        } else {
            self.recent_profits.iter().sum::<f64>() / self.recent_profits.len() as f64
        };
        let opportunities_per_minute = if uptime_seconds > 0.0 {
            self.total_detected as f64 / (uptime_seconds / 60.0)
        } else {
            0.0
        };
        let top_pair = self
            .pair_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(pair, _)| pair.clone())
            .unwrap_or_default();

        SystemStats {
            total_opportunities: self.total_detected,
            avg_profit_percentage,
            opportunities_per_minute,
            uptime_seconds,
            last_opportunity_time_ms: self.last_opportunity_ms,
            top_pair,
            best_profit: self.best_profit,
        }
    }
}
