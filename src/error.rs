//! Error types for the swap bot

use thiserror::Error;

use crate::types::{Address, Amount, Asset};

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the swap bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid asset type: {0}")]
    InvalidAsset(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Network errors
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Aggregator error: {0}")]
    Aggregator(String),

    #[error("Transaction service error: {0}")]
    TxService(String),

    // Swap lifecycle errors
    #[error("No route found for {from} -> {to} (amount {amount})")]
    NoRouteFound { from: Asset, to: Asset, amount: Amount },

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Transaction rejected: {detail}")]
    SubmissionRejected {
        digest: Option<String>,
        detail: String,
    },

    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("{0}")]
    Swap(Box<SwapFailure>),

    // Balance errors
    #[error("Balance query failed for {address} / {asset}: {cause}")]
    BalanceQuery {
        address: Address,
        asset: Asset,
        cause: Box<Error>,
    },

    #[error("Insufficient {asset} balance on {address}: {available} available, {required} required")]
    InsufficientBalance {
        address: Address,
        asset: Asset,
        available: Amount,
        required: Amount,
    },

    // Wallet errors
    #[error("Wallet generation failed: {0}")]
    WalletGeneration(String),

    #[error("Operation cancelled")]
    Cancelled,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse classification used by retry policies and strategy reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    NoRouteFound,
    SimulationFailed,
    SubmissionRejected,
    Transient,
    InsufficientBalance,
    Cancelled,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::NoRouteFound => "no_route",
            ErrorKind::SimulationFailed => "simulation_failed",
            ErrorKind::SubmissionRejected => "submission_rejected",
            ErrorKind::Transient => "transient",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::MissingEnvVar(_)
            | Error::InvalidKey(_)
            | Error::InvalidAsset(_)
            | Error::InvalidAddress(_) => ErrorKind::Config,
            Error::Transient(_) | Error::Rpc { .. } => ErrorKind::Transient,
            Error::NoRouteFound { .. } => ErrorKind::NoRouteFound,
            Error::SimulationFailed(_) => ErrorKind::SimulationFailed,
            Error::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            Error::Swap(failure) => failure.source.kind(),
            Error::BalanceQuery { cause, .. } => cause.kind(),
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Error::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Other,
        }
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Configuration errors abort the process: no iteration can succeed
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}

/// Stage of a swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    Resolving,
    Building,
    Simulating,
    Budgeting,
    Submitting,
    Validating,
}

impl std::fmt::Display for SwapStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SwapStage::Resolving => "resolving",
            SwapStage::Building => "building",
            SwapStage::Simulating => "simulating",
            SwapStage::Budgeting => "budgeting",
            SwapStage::Submitting => "submitting",
            SwapStage::Validating => "validating",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one orchestration run
#[derive(Error, Debug)]
#[error("swap {from} -> {to} ({amount}) failed while {stage}: {source}")]
pub struct SwapFailure {
    pub stage: SwapStage,
    pub from: Asset,
    pub to: Asset,
    pub amount: Amount,
    #[source]
    pub source: Error,
}

impl SwapFailure {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl From<SwapFailure> for Error {
    fn from(e: SwapFailure) -> Self {
        Error::Swap(Box::new(e))
    }
}

// Transport failures from the HTTP client are transient by definition
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transient(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
