pub mod engine;
pub mod registry;
pub mod scanner;
pub mod scorer;
pub mod types;
