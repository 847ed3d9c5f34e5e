// src/arbitrage/scorer.rs
//! Net-profit scoring and TTL assignment for spread candidates.
//!
//! The scorer deducts modeled execution costs from a raw spread and discards
//! anything below the configured threshold. Costs are deliberately simple:
//! per-venue taker fees from configuration and a linear slippage ramp toward
//! a cap as the requested size approaches the available depth.

use crate::arbitrage::types::{Opportunity, SpreadCandidate};
use crate::config::Config;
use log::debug;
use std::collections::HashMap;

/// Maps net profit to a validity window: barely-profitable spreads tend to
/// persist, fat ones get arbitraged away fast. Linear between the profit
/// threshold (longest TTL) and the cutoff (shortest), clamped outside.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    min_secs: u64,
    max_secs: u64,
    threshold_pct: f64,
    cutoff_pct: f64,
}

impl TtlPolicy {
    pub fn new(min_secs: u64, max_secs: u64, threshold_pct: f64, cutoff_pct: f64) -> Self {
        Self {
            min_secs,
            max_secs,
            threshold_pct,
            cutoff_pct,
        }
    }

    pub fn ttl_for(&self, profit_pct: f64) -> u64 {
        if profit_pct >= self.cutoff_pct {
            return self.min_secs;
        }
        if profit_pct <= self.threshold_pct {
            return self.max_secs;
        }
        let frac = (profit_pct - self.threshold_pct) / (self.cutoff_pct - self.threshold_pct);
        let span = (self.max_secs - self.min_secs) as f64;
        let ttl = self.max_secs as f64 - frac * span;
        (ttl.round() as u64).clamp(self.min_secs, self.max_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ProfitabilityScorer {
    min_profit_pct: f64,
    default_trade_size: f64,
    slippage_cap_pct: f64,
    venue_fee_bps: HashMap<String, u32>,
    default_fee_bps: u32,
    ttl: TtlPolicy,
}

impl ProfitabilityScorer {
    pub fn new(config: &Config) -> Self {
        Self {
            min_profit_pct: config.min_profit_pct,
            default_trade_size: config.default_trade_size,
            slippage_cap_pct: config.slippage_cap_pct,
            venue_fee_bps: config.venue_fee_bps.clone(),
            default_fee_bps: config.default_fee_bps,
            ttl: TtlPolicy::new(
                config.ttl_min_secs,
                config.ttl_max_secs,
                config.min_profit_pct,
                config.ttl_profit_cutoff_pct,
            ),
        }
    }

    fn fee_pct_for(&self, venue: &str) -> f64 {
        let bps = self
            .venue_fee_bps
            .get(venue)
            .copied()
            .unwrap_or(self.default_fee_bps);
        bps as f64 / 100.0
    }

    /// Scores one candidate. Returns `None` when the net profit misses the
    /// threshold or the candidate has no executable depth.
    pub fn score(&self, candidate: &SpreadCandidate, now_ms: u64) -> Option<Opportunity> {
        let spread = &candidate.spread;
        let depth = candidate.buy_size.min(candidate.sell_size);
        if depth <= 0.0 || !depth.is_finite() {
            return None;
        }

        // Execution is capped at the thinner leg.
        let size = self.default_trade_size.min(depth);
        let slippage_pct = self.slippage_cap_pct * (size / depth);
        let fee_pct = self.fee_pct_for(&spread.buy_venue) + self.fee_pct_for(&spread.sell_venue);
        let profit_pct = spread.spread_pct - fee_pct - slippage_pct;

        if !profit_pct.is_finite() || profit_pct < self.min_profit_pct {
            debug!(
                "Discarding {} {}->{}: net {:.4}% below threshold {:.4}%",
                spread.pair, spread.buy_venue, spread.sell_venue, profit_pct, self.min_profit_pct
            );
            return None;
        }

        let ttl_seconds = self.ttl.ttl_for(profit_pct);
        Some(Opportunity {
            id: Opportunity::stable_id(
                &spread.pair,
                &spread.buy_venue,
                &spread.sell_venue,
                spread.buy_price,
            ),
            pair: spread.pair.clone(),
            buy_venue: spread.buy_venue.clone(),
            buy_price: spread.buy_price,
            sell_venue: spread.sell_venue.clone(),
            sell_price: spread.sell_price,
            spread_pct: spread.spread_pct,
            profit_pct,
            profit_bps: (profit_pct * 100.0).round() as i64,
            size,
            profit_amount: size * profit_pct / 100.0,
            detected_at_ms: now_ms,
            ttl_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::types::Spread;
    use assert_approx_eq::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn scorer_with(venue_fee_bps: HashMap<String, u32>, default_fee_bps: u32) -> ProfitabilityScorer {
        ProfitabilityScorer {
            min_profit_pct: 0.1,
            default_trade_size: 100.0,
            slippage_cap_pct: 0.1,
            venue_fee_bps,
            default_fee_bps,
            ttl: TtlPolicy::new(5, 60, 0.1, 5.0),
        }
    }

    fn candidate(buy_price: f64, sell_price: f64, depth: f64) -> SpreadCandidate {
        SpreadCandidate {
            spread: Spread {
                pair: "SOL/USDC".to_string(),
                buy_venue: "Raydium".to_string(),
                buy_price,
                sell_venue: "Orca".to_string(),
                sell_price,
                spread_pct: (sell_price - buy_price) / buy_price * 100.0,
            },
            buy_size: depth,
            sell_size: depth,
        }
    }

    #[test]
    fn test_net_profit_after_fees_and_slippage() {
        // Buy at 0.0038, sell at 0.0044: raw spread 15.789%. With 0.05% total
        // fees and slippage at the 0.10% cap the net lands at 15.639%.
        let fees = [("Raydium".to_string(), 5u32), ("Orca".to_string(), 0u32)]
            .into_iter()
            .collect();
        let scorer = scorer_with(fees, 5);
        let opp = scorer.score(&candidate(0.0038, 0.0044, 100.0), 1_000).unwrap();

        assert_approx_eq!(opp.spread_pct, 15.7894737, 1e-4);
        assert_approx_eq!(opp.profit_pct, 15.6394737, 1e-4);
        assert_eq!(opp.profit_bps, 1564);
        // Well past the cutoff, so the shortest window applies.
        assert_eq!(opp.ttl_seconds, 5);
        assert_eq!(opp.detected_at_ms, 1_000);
        assert_approx_eq!(opp.profit_amount, 100.0 * opp.profit_pct / 100.0, 1e-9);
    }

    #[test]
    fn test_fee_lookup_falls_back_to_default() {
        let fees = [("Raydium".to_string(), 25u32)].into_iter().collect();
        let scorer = scorer_with(fees, 5);
        assert_approx_eq!(scorer.fee_pct_for("Raydium"), 0.25, 1e-12);
        assert_approx_eq!(scorer.fee_pct_for("Jupiter"), 0.05, 1e-12);
    }

    #[test]
    fn test_below_threshold_is_discarded() {
        let scorer = scorer_with(HashMap::new(), 5);
        // 0.15% raw spread minus 0.10% fees and 0.10% slippage goes negative.
        assert!(scorer.score(&candidate(100.0, 100.15, 100.0), 1_000).is_none());
    }

    #[test]
    fn test_size_capped_at_depth_and_slippage_scales() {
        let scorer = scorer_with(HashMap::new(), 0);
        // Deep book: requested 100 of 1000 available, slippage is 10% of cap.
        let deep = scorer.score(&candidate(100.0, 102.0, 1_000.0), 0).unwrap();
        assert_approx_eq!(deep.size, 100.0, 1e-12);
        assert_approx_eq!(deep.profit_pct, 2.0 - 0.01, 1e-9);

        // Thin book: execution shrinks to the depth and pays the full cap.
        let thin = scorer.score(&candidate(100.0, 102.0, 40.0), 0).unwrap();
        assert_approx_eq!(thin.size, 40.0, 1e-12);
        assert_approx_eq!(thin.profit_pct, 2.0 - 0.1, 1e-9);
    }

    #[test]
    fn test_ttl_monotonically_shrinks_with_profit() {
        let policy = TtlPolicy::new(5, 60, 0.1, 5.0);
        let profits = [0.05, 0.1, 0.5, 1.0, 2.5, 4.9, 5.0, 20.0];
        let ttls: Vec<u64> = profits.iter().map(|p| policy.ttl_for(*p)).collect();
        for window in ttls.windows(2) {
            assert!(window[1] <= window[0], "ttl must not grow with profit");
        }
        assert_eq!(policy.ttl_for(0.1), 60);
        assert_eq!(policy.ttl_for(5.0), 5);
        assert_eq!(policy.ttl_for(50.0), 5);
    }

    #[test]
    fn test_zero_depth_yields_nothing() {
        let scorer = scorer_with(HashMap::new(), 5);
        assert!(scorer.score(&candidate(100.0, 110.0, 0.0), 0).is_none());
    }
}
