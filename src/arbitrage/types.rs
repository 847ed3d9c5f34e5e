//! Core records flowing through the detection pipeline.
//!
//! A `Quote` is one venue's view of one pair at one instant; it is immutable
//! and superseded (never mutated) by the next observation for the same
//! `(venue, pair)`. A `Spread` is an ephemeral per-cycle candidate derived
//! from two quotes. An `Opportunity` is a scored, time-bounded spread that
//! cleared the profit threshold.

use crate::utils::round_sig;
use serde::{Deserialize, Serialize};

/// Significant digits used to bucket the buy price for opportunity identity.
const ID_PRICE_SIG_DIGITS: u32 = 4;

/// A normalized price observation for one pair on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub venue: String,
    pub pair: String,
    /// Quote-asset units per base-asset unit.
    pub price: f64,
    /// Executable depth estimate, in base-asset units.
    pub available_size: f64,
    pub observed_at_ms: u64,
}

impl Quote {
    pub fn is_fresh(&self, now_ms: u64, freshness_window_ms: u64) -> bool {
        now_ms.saturating_sub(self.observed_at_ms) <= freshness_window_ms
    }
}

/// A raw cross-venue price discrepancy. Recomputed every scan cycle and never
/// persisted beyond scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spread {
    pub pair: String,
    pub buy_venue: String,
    pub buy_price: f64,
    pub sell_venue: String,
    pub sell_price: f64,
    pub spread_pct: f64,
}

/// A scanner candidate: the spread plus the depth of each leg, which the
/// scorer needs for size capping and slippage modeling.
#[derive(Debug, Clone)]
pub struct SpreadCandidate {
    pub spread: Spread,
    pub buy_size: f64,
    pub sell_size: f64,
}

/// A scored arbitrage opportunity with a bounded validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub pair: String,
    pub buy_venue: String,
    pub buy_price: f64,
    pub sell_venue: String,
    pub sell_price: f64,
    pub spread_pct: f64,
    /// Spread net of modeled fees and slippage.
    pub profit_pct: f64,
    pub profit_bps: i64,
    /// Executable size, capped at the smaller leg's depth (base units).
    pub size: f64,
    /// `size * profit_pct / 100`, in base units.
    pub profit_amount: f64,
    pub detected_at_ms: u64,
    pub ttl_seconds: u64,
}

impl Opportunity {
    /// Deterministic identity for a logical opportunity: re-detections of the
    /// same pair/venue-pair within the same price bucket coalesce instead of
    /// accumulating duplicates.
    pub fn stable_id(pair: &str, buy_venue: &str, sell_venue: &str, buy_price: f64) -> String {
        let bucket = round_sig(buy_price, ID_PRICE_SIG_DIGITS);
        format!("{}|{}>{}|{}", pair, buy_venue, sell_venue, bucket)
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.detected_at_ms + self.ttl_seconds * 1000
    }

    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms()
    }

    pub fn log_summary(&self) {
        log::info!(
            "💰 [{}] {} | {}@{:.6} -> {}@{:.6} | spread {:+.2}% | profit {:.2}% ({}bps) | size {:.4} | ttl {}s",
            self.id,
            self.pair,
            self.buy_venue,
            self.buy_price,
            self.sell_venue,
            self.sell_price,
            self.spread_pct,
            self.profit_pct,
            self.profit_bps,
            self.size,
            self.ttl_seconds
        );
    }

    /// Structural invariants the registry enforces on every sweep.
    pub fn validate(&self) -> bool {
        self.sell_price > self.buy_price
            && self.buy_venue != self.sell_venue
            && self.ttl_seconds > 0
            && self.size > 0.0
            && self.profit_pct.is_finite()
    }
}

/// Process-wide aggregate statistics, reset only on restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_opportunities: u64,
    pub avg_profit_percentage: f64,
    pub opportunities_per_minute: f64,
    pub uptime_seconds: f64,
    pub last_opportunity_time_ms: u64,
    pub top_pair: String,
    pub best_profit: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opp(detected_at_ms: u64, ttl_seconds: u64) -> Opportunity {
        Opportunity {
            id: Opportunity::stable_id("SOL/USDC", "Raydium", "Orca", 0.0038),
            pair: "SOL/USDC".to_string(),
            buy_venue: "Raydium".to_string(),
            buy_price: 0.0038,
            sell_venue: "Orca".to_string(),
            sell_price: 0.0044,
            spread_pct: 15.79,
            profit_pct: 15.64,
            profit_bps: 1564,
            size: 100.0,
            profit_amount: 15.64,
            detected_at_ms,
            ttl_seconds,
        }
    }

    #[test]
    fn test_stable_id_coalesces_nearby_prices() {
        let a = Opportunity::stable_id("SOL/USDC", "Raydium", "Orca", 0.0038001);
        let b = Opportunity::stable_id("SOL/USDC", "Raydium", "Orca", 0.0038004);
        let c = Opportunity::stable_id("SOL/USDC", "Raydium", "Orca", 0.0044);
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Direction matters: buying on Orca is a different opportunity.
        let d = Opportunity::stable_id("SOL/USDC", "Orca", "Raydium", 0.0038);
        assert_ne!(a, d);
    }

    #[test]
    fn test_expiry_boundary() {
        let o = opp(0, 10);
        assert!(o.is_live(0));
        assert!(o.is_live(9_999));
        assert!(!o.is_live(10_000));
        assert!(!o.is_live(20_000));
    }

    #[test]
    fn test_quote_freshness() {
        let q = Quote {
            venue: "Jupiter".to_string(),
            pair: "SOL/USDC".to_string(),
            price: 152.3,
            available_size: 250.0,
            observed_at_ms: 1_000,
        };
        assert!(q.is_fresh(5_000, 5_000));
        assert!(!q.is_fresh(6_001, 5_000));
    }

    #[test]
    fn test_validate_rejects_inverted_spread() {
        let mut o = opp(0, 10);
        assert!(o.validate());
        o.sell_price = o.buy_price;
        assert!(!o.validate());
    }
}
