use crate::error::ArbError;
use std::collections::HashMap;
use std::env;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const RAY_MINT: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";

/// One tradable pair the engine watches, with the mint addresses the venue
/// APIs key their quotes by.
#[derive(Debug, Clone, PartialEq)]
pub struct PairConfig {
    pub symbol: String,
    pub base_mint: String,
    pub quote_mint: String,
}

impl PairConfig {
    /// Splits `"SOL/USDC"` into `("SOL", "USDC")`.
    pub fn symbols(&self) -> (&str, &str) {
        match self.symbol.split_once('/') {
            Some((base, quote)) => (base, quote),
            None => (self.symbol.as_str(), ""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub pairs: Vec<PairConfig>,
    pub min_profit_pct: f64,
    pub cycle_interval_ms: u64,
    pub source_timeout_ms: u64,
    pub freshness_window_ms: u64,
    pub min_call_spacing_ms: u64,
    pub max_fetch_attempts: u32,
    pub unhealthy_after_failures: u32,
    pub venue_fee_bps: HashMap<String, u32>,
    pub default_fee_bps: u32,
    pub slippage_cap_pct: f64,
    pub default_trade_size: f64,
    pub default_depth: f64,
    pub ttl_min_secs: u64,
    pub ttl_max_secs: u64,
    pub ttl_profit_cutoff_pct: f64,
    pub publisher_bind: String,
    pub stats_interval_secs: u64,
    pub broadcast_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            pairs: env::var("PAIRS")
                .ok()
                .map(|s| parse_pairs(&s))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_pairs),
            min_profit_pct: env::var("MIN_PROFIT_PCT")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
            cycle_interval_ms: env::var("CYCLE_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            source_timeout_ms: env::var("SOURCE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            freshness_window_ms: env::var("FRESHNESS_WINDOW_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            min_call_spacing_ms: env::var("MIN_CALL_SPACING_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .unwrap_or(250),
            max_fetch_attempts: env::var("MAX_FETCH_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            unhealthy_after_failures: env::var("UNHEALTHY_AFTER_FAILURES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            venue_fee_bps: env::var("VENUE_FEE_BPS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .filter_map(|part| {
                            let mut kv = part.split(':');
                            let key = kv.next()?.trim().to_string();
                            let value = kv.next()?.trim().parse::<u32>().ok()?;
                            Some((key, value))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            default_fee_bps: env::var("DEFAULT_FEE_BPS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            slippage_cap_pct: env::var("SLIPPAGE_CAP_PCT")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
            default_trade_size: env::var("DEFAULT_TRADE_SIZE")
                .unwrap_or_else(|_| "100.0".to_string())
                .parse()
                .unwrap_or(100.0),
            default_depth: env::var("DEFAULT_DEPTH")
                .unwrap_or_else(|_| "250.0".to_string())
                .parse()
                .unwrap_or(250.0),
            ttl_min_secs: env::var("TTL_MIN_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            ttl_max_secs: env::var("TTL_MAX_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            ttl_profit_cutoff_pct: env::var("TTL_PROFIT_CUTOFF_PCT")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()
                .unwrap_or(5.0),
            publisher_bind: env::var("PUBLISHER_BIND")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            stats_interval_secs: env::var("STATS_INTERVAL_SECS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            broadcast_capacity: env::var("BROADCAST_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .unwrap_or(256),
        }
    }

    pub fn validate_and_log(&self) -> Result<(), ArbError> {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.rpc_url.is_empty() {
            return Err(ArbError::ConfigError("RPC_URL cannot be empty".to_string()));
        }
        if self.pairs.is_empty() {
            return Err(ArbError::ConfigError(
                "At least one trading pair must be configured".to_string(),
            ));
        }
        if self.min_profit_pct < 0.0 {
            return Err(ArbError::ConfigError(
                "MIN_PROFIT_PCT must be non-negative".to_string(),
            ));
        }
        if self.ttl_min_secs == 0 || self.ttl_min_secs > self.ttl_max_secs {
            return Err(ArbError::ConfigError(format!(
                "Invalid TTL bounds: min={} max={}",
                self.ttl_min_secs, self.ttl_max_secs
            )));
        }
        if self.ttl_profit_cutoff_pct <= self.min_profit_pct {
            return Err(ArbError::ConfigError(
                "TTL_PROFIT_CUTOFF_PCT must exceed MIN_PROFIT_PCT".to_string(),
            ));
        }
        if self.default_trade_size <= 0.0 || self.default_depth <= 0.0 {
            return Err(ArbError::ConfigError(
                "Trade size and depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// `PAIRS` format: `SYMBOL:BASE_MINT:QUOTE_MINT` entries joined by commas,
/// e.g. `SOL/USDC:So111...:EPjF...,RAY/USDC:4k3D...:EPjF...`.
fn parse_pairs(s: &str) -> Vec<PairConfig> {
    s.split(',')
        .filter_map(|part| {
            let mut fields = part.split(':');
            let symbol = fields.next()?.trim().to_string();
            let base_mint = fields.next()?.trim().to_string();
            let quote_mint = fields.next()?.trim().to_string();
            if symbol.is_empty() || base_mint.is_empty() || quote_mint.is_empty() {
                return None;
            }
            Some(PairConfig {
                symbol,
                base_mint,
                quote_mint,
            })
        })
        .collect()
}

fn default_pairs() -> Vec<PairConfig> {
    vec![
        PairConfig {
            symbol: "SOL/USDC".to_string(),
            base_mint: SOL_MINT.to_string(),
            quote_mint: USDC_MINT.to_string(),
        },
        PairConfig {
            symbol: "RAY/USDC".to_string(),
            base_mint: RAY_MINT.to_string(),
            quote_mint: USDC_MINT.to_string(),
        },
    ]
}
