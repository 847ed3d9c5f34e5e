pub mod arbitrage;
pub mod config;
pub mod dex;
pub mod error;
pub mod publisher;
pub mod solana;
pub mod utils;

// Re-export the core pipeline types for consumers and integration tests.
pub use arbitrage::{
    engine::DetectionEngine,
    registry::OpportunityRegistry,
    scanner::{QuoteBook, SpreadScanner},
    scorer::ProfitabilityScorer,
    types::{Opportunity, Quote, Spread, SystemStats},
};
pub use publisher::{Publisher, PushMessage};
