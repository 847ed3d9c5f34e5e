// src/dex/clients/orca.rs
//! Orca Whirlpools adapter. Prices come from the pool list endpoint's
//! sqrt-price, converted with the standard Q64.64 whirlpool math; the deepest
//! pool by liquidity wins when a pair has several whirlpools.

use crate::config::{Config, PairConfig};
use crate::dex::{guarded_fetch, QuoteSource, RateLimiter, RawVenueQuote, SourceHealth};
use crate::error::{ArbError, Result, RetryPolicy};
use crate::utils::now_ms;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

const ORCA_API_URL: &str = "https://api.mainnet.orca.so/v1/whirlpool/list";

#[derive(Debug, Deserialize)]
struct OrcaApiResponse {
    whirlpools: Vec<OrcaApiPool>,
}

#[derive(Debug, Deserialize)]
struct OrcaApiPool {
    address: String,
    #[serde(rename = "tokenA")]
    token_a: OrcaApiToken,
    #[serde(rename = "tokenB")]
    token_b: OrcaApiToken,
    liquidity: String,
    #[serde(rename = "sqrtPrice")]
    sqrt_price: String,
}

#[derive(Debug, Deserialize)]
struct OrcaApiToken {
    mint: String,
    decimals: u8,
}

/// Human-readable price of token A in token B units from a Q64.64 sqrt-price.
fn whirlpool_price(sqrt_price: u128, decimals_a: u8, decimals_b: u8) -> f64 {
    let ratio = sqrt_price as f64 / 2f64.powi(64);
    ratio * ratio * 10f64.powi(decimals_a as i32 - decimals_b as i32)
}

pub struct OrcaSource {
    name: String,
    client: reqwest::Client,
    pairs: Vec<PairConfig>,
    default_depth: f64,
    health: SourceHealth,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl OrcaSource {
    pub fn new(config: &Config) -> Self {
        Self {
            name: "Orca".to_string(),
            client: reqwest::Client::new(),
            pairs: config.pairs.clone(),
            default_depth: config.default_depth,
            health: SourceHealth::new(config.unhealthy_after_failures),
            limiter: RateLimiter::new(Duration::from_millis(config.min_call_spacing_ms)),
            retry: RetryPolicy::new(
                config.max_fetch_attempts,
                Duration::from_millis(200),
                Duration::from_millis(2_000),
            ),
        }
    }

    /// Best (deepest) pool price for one configured pair, oriented so the
    /// price is quote units per base unit. Zero-liquidity pools are ignored.
    fn best_pool_price(pools: &[OrcaApiPool], pair: &PairConfig) -> Option<f64> {
        let mut best: Option<(u128, f64)> = None;
        for pool in pools {
            let forward =
                pool.token_a.mint == pair.base_mint && pool.token_b.mint == pair.quote_mint;
            let reverse =
                pool.token_b.mint == pair.base_mint && pool.token_a.mint == pair.quote_mint;
            if !forward && !reverse {
                continue;
            }
            let Ok(liquidity) = pool.liquidity.parse::<u128>() else {
                continue;
            };
            let Ok(sqrt_price) = pool.sqrt_price.parse::<u128>() else {
                continue;
            };
            if liquidity == 0 || sqrt_price == 0 {
                continue;
            }

            let a_in_b = whirlpool_price(sqrt_price, pool.token_a.decimals, pool.token_b.decimals);
            let price = if forward { a_in_b } else { 1.0 / a_in_b };
            if best.map_or(true, |(l, _)| liquidity > l) {
                debug!(
                    "Orca pool {} selected for {} (liquidity {})",
                    pool.address, pair.symbol, liquidity
                );
                best = Some((liquidity, price));
            }
        }
        best.map(|(_, price)| price)
    }

    async fn fetch_once(&self) -> Result<Vec<RawVenueQuote>> {
        let response = self.client.get(ORCA_API_URL).send().await?;

        if !response.status().is_success() {
            return Err(ArbError::SourceUnavailable(format!(
                "Orca API returned status {}",
                response.status()
            )));
        }

        let parsed: OrcaApiResponse = response
            .json()
            .await
            .map_err(|e| ArbError::ParseError(format!("Orca response: {}", e)))?;

        let observed_at_ms = now_ms();
        let mut quotes = Vec::new();
        for pair in &self.pairs {
            let Some(price) = Self::best_pool_price(&parsed.whirlpools, pair) else {
                debug!("No Orca whirlpool found for {}", pair.symbol);
                continue;
            };
            let (base_symbol, quote_symbol) = pair.symbols();
            quotes.push(RawVenueQuote {
                venue: self.name.clone(),
                base_symbol: base_symbol.to_string(),
                quote_symbol: quote_symbol.to_string(),
                price,
                available_size: self.default_depth,
                observed_at_ms,
            });
        }
        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for OrcaSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_quotes(&self) -> Result<Vec<RawVenueQuote>> {
        guarded_fetch(&self.name, &self.limiter, &self.retry, &self.health, || {
            self.fetch_once()
        })
        .await
    }

    fn health(&self) -> &SourceHealth {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{SOL_MINT, USDC_MINT};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_whirlpool_price_identity() {
        // sqrtPrice = 2^64 means a raw ratio of 1.0; with equal decimals the
        // human price is 1.0 as well.
        let sp = 1u128 << 64;
        assert_approx_eq!(whirlpool_price(sp, 6, 6), 1.0, 1e-12);
        // SOL (9 decimals) vs USDC (6): raw ratio 1.0 scales by 10^3.
        assert_approx_eq!(whirlpool_price(sp, 9, 6), 1_000.0, 1e-6);
    }

    fn pool(a_mint: &str, b_mint: &str, liquidity: &str, sqrt_price: &str) -> OrcaApiPool {
        OrcaApiPool {
            address: "pool".to_string(),
            token_a: OrcaApiToken {
                mint: a_mint.to_string(),
                decimals: 9,
            },
            token_b: OrcaApiToken {
                mint: b_mint.to_string(),
                decimals: 6,
            },
            liquidity: liquidity.to_string(),
            sqrt_price: sqrt_price.to_string(),
        }
    }

    #[test]
    fn test_best_pool_prefers_deepest_and_skips_empty() {
        let pair = PairConfig {
            symbol: "SOL/USDC".to_string(),
            base_mint: SOL_MINT.to_string(),
            quote_mint: USDC_MINT.to_string(),
        };
        let sp = (1u128 << 64).to_string();
        let pools = vec![
            pool(SOL_MINT, USDC_MINT, "0", &sp), // empty, ignored
            pool(SOL_MINT, USDC_MINT, "500", &sp),
            pool(SOL_MINT, USDC_MINT, "100", &((1u128 << 63).to_string())),
        ];
        let price = OrcaSource::best_pool_price(&pools, &pair).unwrap();
        assert_approx_eq!(price, 1_000.0, 1e-6);
    }

    #[test]
    fn test_reverse_orientation_inverts_price() {
        let pair = PairConfig {
            symbol: "SOL/USDC".to_string(),
            base_mint: SOL_MINT.to_string(),
            quote_mint: USDC_MINT.to_string(),
        };
        // Pool lists USDC as token A and SOL as token B.
        let mut p = pool(USDC_MINT, SOL_MINT, "500", &((1u128 << 64).to_string()));
        p.token_a.decimals = 6;
        p.token_b.decimals = 9;
        // A-in-B price is 10^-3, so the SOL/USDC price is its inverse.
        let price = OrcaSource::best_pool_price(&[p], &pair).unwrap();
        assert_approx_eq!(price, 1_000.0, 1e-6);
    }
}
