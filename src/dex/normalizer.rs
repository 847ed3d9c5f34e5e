//! Price normalizer: raw venue payloads into canonical `Quote` records.
//!
//! Venues disagree on token ordering, so the same economic pair must be
//! rewritten into one canonical orientation before quotes can be compared.
//! Malformed observations (non-positive price or size) are rejected here and
//! dropped by the caller rather than propagated down the pipeline.

use crate::arbitrage::types::Quote;
use crate::dex::RawVenueQuote;
use crate::error::{ArbError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Preferred quote-side assets, strongest first. A pair is oriented so the
/// strongest quote asset ends up on the quote side; pairs involving none of
/// these fall back to alphabetical ordering of the base symbol.
static QUOTE_PRIORITY: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    [("USDC", 0), ("USDT", 1), ("SOL", 2)].into_iter().collect()
});

fn quote_rank(symbol: &str) -> u8 {
    QUOTE_PRIORITY.get(symbol).copied().unwrap_or(u8::MAX)
}

/// Canonical symbol for an unordered token pair, e.g. `("USDC", "SOL")` and
/// `("SOL", "USDC")` both map to `SOL/USDC`. Returns the symbol and whether
/// the input orientation had to be flipped.
pub fn canonical_pair(base: &str, quote: &str) -> (String, bool) {
    let flip = match (quote_rank(base), quote_rank(quote)) {
        (b, q) if b < q => true,
        (b, q) if b > q => false,
        // Same rank only happens for exotic pairs; order alphabetically.
        _ => base > quote,
    };
    if flip {
        (format!("{}/{}", quote, base), true)
    } else {
        (format!("{}/{}", base, quote), false)
    }
}

/// Converts one raw venue observation into a canonical `Quote`.
pub fn normalize(raw: RawVenueQuote) -> Result<Quote> {
    if !raw.price.is_finite() || raw.price <= 0.0 {
        return Err(ArbError::InvalidQuote(format!(
            "{} {}/{}: non-positive price {}",
            raw.venue, raw.base_symbol, raw.quote_symbol, raw.price
        )));
    }
    if !raw.available_size.is_finite() || raw.available_size <= 0.0 {
        return Err(ArbError::InvalidQuote(format!(
            "{} {}/{}: non-positive size {}",
            raw.venue, raw.base_symbol, raw.quote_symbol, raw.available_size
        )));
    }

    let (pair, flipped) = canonical_pair(&raw.base_symbol, &raw.quote_symbol);
    let (price, available_size) = if flipped {
        // Invert the price and restate depth in the new base asset.
        (1.0 / raw.price, raw.available_size * raw.price)
    } else {
        (raw.price, raw.available_size)
    };

    Ok(Quote {
        venue: raw.venue,
        pair,
        price,
        available_size,
        observed_at_ms: raw.observed_at_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn raw(base: &str, quote: &str, price: f64, size: f64) -> RawVenueQuote {
        RawVenueQuote {
            venue: "Jupiter".to_string(),
            base_symbol: base.to_string(),
            quote_symbol: quote.to_string(),
            price,
            available_size: size,
            observed_at_ms: 1_000,
        }
    }

    #[test]
    fn test_canonical_orientation_is_preserved() {
        let q = normalize(raw("SOL", "USDC", 152.5, 250.0)).unwrap();
        assert_eq!(q.pair, "SOL/USDC");
        assert_approx_eq!(q.price, 152.5);
        assert_approx_eq!(q.available_size, 250.0);
    }

    #[test]
    fn test_flipped_orientation_inverts_price() {
        // A venue reporting USDC/SOL must compare correctly against venues
        // reporting SOL/USDC.
        let q = normalize(raw("USDC", "SOL", 1.0 / 152.5, 38_125.0)).unwrap();
        assert_eq!(q.pair, "SOL/USDC");
        assert_approx_eq!(q.price, 152.5, 1e-9);
        // 38,125 USDC of depth is 250 SOL at this price.
        assert_approx_eq!(q.available_size, 250.0, 1e-6);
    }

    #[test]
    fn test_exotic_pair_orders_alphabetically() {
        let (pair, flipped) = canonical_pair("WIF", "BONK");
        assert_eq!(pair, "BONK/WIF");
        assert!(flipped);
        let (pair, flipped) = canonical_pair("BONK", "WIF");
        assert_eq!(pair, "BONK/WIF");
        assert!(!flipped);
    }

    #[test]
    fn test_rejects_non_positive_price_and_size() {
        assert!(matches!(
            normalize(raw("SOL", "USDC", 0.0, 250.0)),
            Err(ArbError::InvalidQuote(_))
        ));
        assert!(matches!(
            normalize(raw("SOL", "USDC", -1.5, 250.0)),
            Err(ArbError::InvalidQuote(_))
        ));
        assert!(matches!(
            normalize(raw("SOL", "USDC", 152.5, 0.0)),
            Err(ArbError::InvalidQuote(_))
        ));
        assert!(matches!(
            normalize(raw("SOL", "USDC", f64::NAN, 250.0)),
            Err(ArbError::InvalidQuote(_))
        ));
    }
}
