//! Trading module - swap orchestration and execution helpers
//!
//! - `orchestrator` runs one swap from route lookup to validated execution
//! - `budget` turns dry-run gas costs into a gas budget
//! - `transfer` sends plain coin transfers
//! - `retry` holds the loop policy and the cancellable iteration driver

pub mod budget;
pub mod orchestrator;
pub mod retry;
pub mod transfer;

pub use budget::BudgetEstimator;
pub use orchestrator::{SwapOrchestrator, SwapOutcome, SwapRequest};
pub use retry::{drive, pause, Attempts, DriveReport, RetryPolicy};
pub use transfer::{TransferOutcome, TransferRequest};
