//! Sui Swap Bot Library
//!
//! Aggregator-routed swaps on Sui: every swap is resolved, dry-run,
//! budgeted from the dry run and only then signed and executed.

pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod strategy;
pub mod trading;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
