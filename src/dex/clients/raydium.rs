// src/dex/clients/raydium.rs
//! Raydium price API adapter. The endpoint returns a flat mint -> USDC price
//! map, so every configured pair must quote against USDC here; other pairs
//! are skipped with a debug note.

use crate::config::settings::USDC_MINT;
use crate::config::{Config, PairConfig};
use crate::dex::{guarded_fetch, QuoteSource, RateLimiter, RawVenueQuote, SourceHealth};
use crate::error::{ArbError, Result, RetryPolicy};
use crate::utils::now_ms;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const RAYDIUM_PRICE_URL: &str = "https://api.raydium.io/v2/main/price";

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RaydiumPriceResponse(HashMap<String, f64>);

pub struct RaydiumSource {
    name: String,
    client: reqwest::Client,
    pairs: Vec<PairConfig>,
    default_depth: f64,
    health: SourceHealth,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl RaydiumSource {
    pub fn new(config: &Config) -> Self {
        Self {
            name: "Raydium".to_string(),
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

    async fn fetch_once(&self) -> Result<Vec<RawVenueQuote>> {
        let response = self.client.get(RAYDIUM_PRICE_URL).send().await?;

        if !response.status().is_success() {
            return Err(ArbError::SourceUnavailable(format!(
                "Raydium API returned status {}",
                response.status()
            )));
        }

        let parsed: RaydiumPriceResponse = response
            .json()
            .await
            .map_err(|e| ArbError::ParseError(format!("Raydium response: {}", e)))?;

        let observed_at_ms = now_ms();
        let mut quotes = Vec::new();
        for pair in &self.pairs {
            if pair.quote_mint != USDC_MINT {
                debug!(
                    "Raydium price feed is USDC-denominated; skipping {}",
                    pair.symbol
                );
                continue;
            }
            let Some(&price) = parsed.0.get(&pair.base_mint) else {
                debug!("Raydium returned no price for {}", pair.symbol);
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
            debug!("Raydium quote {}: {}", pair.symbol, price);
        }
        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for RaydiumSource {
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

    #[test]
    fn test_parses_flat_price_map() {
        let body = r#"{
            "So11111111111111111111111111111111111111112": 152.41,
            "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R": 2.03
        }"#;
        let parsed: RaydiumPriceResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.0["So11111111111111111111111111111111111111112"],
            152.41
        );
        assert_eq!(parsed.0.len(), 2);
    }
}
