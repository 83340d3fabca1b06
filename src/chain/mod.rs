//! Chain and aggregator collaborators
//!
//! The orchestrator only talks to these traits:
//! - `RouteResolver` finds candidate routes (aggregator HTTP API)
//! - `TransactionBuilder` appends operations and encodes drafts
//! - `ChainClient` runs dry runs, executes, and reads balances (full node)
//! - `Signer` signs encoded transactions
//! - `WalletFactory` creates and restores keypairs
//!
//! Concrete HTTP implementations live in the submodules.

pub mod aggregator;
pub mod sui_rpc;
pub mod tx_service;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{
    Address, Amount, Asset, BuiltTransaction, DraftOperation, RouteBundle, SimulationReport,
    SubmissionResult, TransactionDraft,
};
use crate::wallet::{SecretKey, Wallet};

pub use aggregator::AggregatorClient;
pub use sui_rpc::SuiRpcClient;
pub use tx_service::TxServiceClient;

/// Route discovery
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Candidate routes in the resolver's own order; `None` means no route
    async fn resolve_route(
        &self,
        from: &Asset,
        to: &Asset,
        amount: &Amount,
        by_amount_in: bool,
    ) -> Result<Option<RouteBundle>>;
}

/// Transaction assembly
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    /// Append swap operations for `bundle`. May be called repeatedly on one
    /// draft to batch identical swaps.
    async fn append_swap(
        &self,
        draft: &mut TransactionDraft,
        bundle: &RouteBundle,
        slippage: Decimal,
        by_amount_in: bool,
    ) -> Result<()> {
        if bundle.is_empty() {
            return Err(Error::TransactionBuild("route bundle is empty".into()));
        }
        draft.push(DraftOperation::Swap {
            routes: bundle.routes.clone(),
            slippage,
            by_amount_in,
        });
        Ok(())
    }

    /// Append a plain coin transfer
    async fn append_transfer(
        &self,
        draft: &mut TransactionDraft,
        recipient: &Address,
        asset: &Asset,
        amount: &Amount,
    ) -> Result<()> {
        draft.push(DraftOperation::Transfer {
            recipient: recipient.clone(),
            asset: asset.clone(),
            amount: amount.clone(),
        });
        Ok(())
    }

    /// Encode the draft against current chain state
    async fn build(&self, draft: &TransactionDraft) -> Result<BuiltTransaction>;
}

/// Full-node access
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn simulate(&self, tx: &BuiltTransaction) -> Result<SimulationReport>;

    /// Sign with `signer` and execute, reporting effects and balance changes
    async fn submit(&self, tx: &BuiltTransaction, signer: &Wallet) -> Result<SubmissionResult>;

    async fn query_balance(&self, address: &Address, asset: &Asset) -> Result<Amount>;

    /// Every coin type held by `address` with its total balance
    async fn all_balances(&self, address: &Address) -> Result<Vec<(Asset, Amount)>>;
}

/// Transaction signing
#[async_trait]
pub trait Signer: Send + Sync {
    /// Serialized signature over `tx` by `wallet`
    async fn sign(&self, tx: &BuiltTransaction, wallet: &Wallet) -> Result<String>;
}

/// Keypair creation
#[async_trait]
pub trait WalletFactory: Send + Sync {
    async fn generate(&self) -> Result<Wallet>;

    /// Derive the wallet for an existing secret
    async fn restore(&self, secret: &SecretKey) -> Result<Wallet>;
}

/// Map an HTTP response status: 5xx and 429 are transient, other
/// failures are reported through `permanent`
pub(crate) async fn check_status(
    response: Response,
    permanent: fn(String) -> Error,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("HTTP {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(Error::Transient(detail))
    } else {
        Err(permanent(detail))
    }
}
