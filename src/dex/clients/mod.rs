pub mod jupiter;
pub mod orca;
pub mod raydium;
