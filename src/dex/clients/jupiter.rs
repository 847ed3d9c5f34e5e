// src/dex/clients/jupiter.rs
//! Jupiter price API adapter.

use crate::config::{Config, PairConfig};
use crate::dex::{guarded_fetch, QuoteSource, RateLimiter, RawVenueQuote, SourceHealth};
use crate::error::{ArbError, Result, RetryPolicy};
use crate::utils::now_ms;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const JUPITER_PRICE_URL: &str = "https://price.jup.ag/v4/price";

#[derive(Debug, Deserialize)]
struct JupiterPriceResponse {
    data: HashMap<String, JupiterPriceEntry>,
}

#[derive(Debug, Deserialize)]
struct JupiterPriceEntry {
    id: String,
    price: f64,
}

pub struct JupiterSource {
    name: String,
    client: reqwest::Client,
    pairs: Vec<PairConfig>,
    default_depth: f64,
    health: SourceHealth,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl JupiterSource {
    pub fn new(config: &Config) -> Self {
        Self {
            name: "Jupiter".to_string(),
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

    /// One request per distinct vsToken, batching every base mint quoted
    /// against it.
    async fn fetch_once(&self) -> Result<Vec<RawVenueQuote>> {
        let mut by_vs_token: HashMap<&str, Vec<&PairConfig>> = HashMap::new();
        for pair in &self.pairs {
            by_vs_token.entry(&pair.quote_mint).or_default().push(pair);
        }

        let mut quotes = Vec::new();
        for (vs_token, pairs) in by_vs_token {
            let ids = pairs
                .iter()
                .map(|p| p.base_mint.as_str())
                .collect::<Vec<_>>()
                .join(",");

            let response = self
                .client
                .get(JUPITER_PRICE_URL)
                .query(&[("ids", ids.as_str()), ("vsToken", vs_token)])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ArbError::SourceUnavailable(format!(
                    "Jupiter API returned status {}",
                    response.status()
                )));
            }

            let parsed: JupiterPriceResponse = response
                .json()
                .await
                .map_err(|e| ArbError::ParseError(format!("Jupiter response: {}", e)))?;

            let observed_at_ms = now_ms();
            for pair in pairs {
                let Some(entry) = parsed.data.get(&pair.base_mint) else {
                    debug!("Jupiter returned no price for {}", pair.symbol);
                    continue;
                };
                let (base_symbol, quote_symbol) = pair.symbols();
                quotes.push(RawVenueQuote {
                    venue: self.name.clone(),
                    base_symbol: base_symbol.to_string(),
                    quote_symbol: quote_symbol.to_string(),
                    price: entry.price,
                    available_size: self.default_depth,
                    observed_at_ms,
                });
                debug!("Jupiter quote {} ({}): {}", pair.symbol, entry.id, entry.price);
            }
        }
        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for JupiterSource {
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
    fn test_parses_price_payload() {
        let body = r#"{
            "data": {
                "So11111111111111111111111111111111111111112": {
                    "id": "So11111111111111111111111111111111111111112",
                    "mintSymbol": "SOL",
                    "vsToken": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    "vsTokenSymbol": "USDC",
                    "price": 152.53
                }
            },
            "timeTaken": 0.002
        }"#;
        let parsed: JupiterPriceResponse = serde_json::from_str(body).unwrap();
        let entry = &parsed.data["So11111111111111111111111111111111111111112"];
        assert_eq!(entry.price, 152.53);
        assert_eq!(entry.id, "So11111111111111111111111111111111111111112");
    }
}
