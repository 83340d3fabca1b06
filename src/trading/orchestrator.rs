//! Swap orchestration
//!
//! One run drives a swap through
//! `Resolving -> Building -> Simulating -> Budgeting -> Submitting -> Validating`.
//! Nothing is retried inside a run; the strategy's retry policy decides
//! what happens after a failure. Cancellation is honored at every stage
//! boundary up to submission, so a cancelled run never signs anything.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::budget::BudgetEstimator;
use crate::chain::{ChainClient, RouteResolver, TransactionBuilder};
use crate::error::{Error, ErrorKind, Result, SwapFailure, SwapStage};
use crate::types::{
    Amount, Asset, BalanceChange, BuiltTransaction, ExecutionStatus, GasCost, TransactionDraft,
};
use crate::wallet::Wallet;

/// Parameters of one swap run
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub wallet: Wallet,
    pub from: Asset,
    pub to: Asset,
    /// Input amount of a single swap
    pub amount: Amount,
    /// Number of identical swaps packed into the transaction
    pub batch: u32,
    pub slippage: Decimal,
    pub gas_margin: Decimal,
    /// Budget encoded into the dry-run build
    pub provisional_gas_budget: Amount,
}

impl SwapRequest {
    /// Total input across the batch
    pub fn total_in(&self) -> Amount {
        self.amount.times(self.batch)
    }
}

/// Successful swap
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub digest: String,
    pub balance_changes: Vec<BalanceChange>,
    pub gas_budget: Amount,
    pub gas_used: GasCost,
    /// Candidate routes used from the aggregator
    pub routes: usize,
    /// Quoted output of one swap
    pub quoted_out: Amount,
}

impl SwapOutcome {
    /// Net change of `asset` for `wallet` reported by the execution
    pub fn balance_change(&self, wallet: &Wallet, asset: &Asset) -> Option<&BalanceChange> {
        self.balance_changes
            .iter()
            .find(|c| &c.asset == asset && c.owner.as_ref() == Some(&wallet.address))
    }
}

/// Drives swaps through route resolution, dry run, budgeting and execution
pub struct SwapOrchestrator {
    pub(crate) resolver: Arc<dyn RouteResolver>,
    pub(crate) builder: Arc<dyn TransactionBuilder>,
    pub(crate) chain: Arc<dyn ChainClient>,
}

impl SwapOrchestrator {
    pub fn new(
        resolver: Arc<dyn RouteResolver>,
        builder: Arc<dyn TransactionBuilder>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            resolver,
            builder,
            chain,
        }
    }

    /// Execute one swap. Failures carry the stage they happened in.
    pub async fn execute(
        &self,
        request: &SwapRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<SwapOutcome, SwapFailure> {
        let mut stage = SwapStage::Resolving;
        let result = self.run(request, cancel, &mut stage).await;
        result.map_err(|source| {
            warn!(
                "Swap {} -> {} failed while {}: {}",
                request.from.symbol(),
                request.to.symbol(),
                stage,
                source
            );
            SwapFailure {
                stage,
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount.clone(),
                source,
            }
        })
    }

    async fn run(
        &self,
        request: &SwapRequest,
        cancel: &CancellationToken,
        stage: &mut SwapStage,
    ) -> Result<SwapOutcome> {
        if request.batch == 0 {
            return Err(Error::InvalidAmount("batch size must be at least 1".into()));
        }

        // Resolving
        *stage = SwapStage::Resolving;
        ensure_active(cancel)?;
        info!(
            "Finding routes {} -> {} for {} (x{})",
            request.from.symbol(),
            request.to.symbol(),
            request.amount,
            request.batch
        );
        let bundle = self
            .resolver
            .resolve_route(&request.from, &request.to, &request.amount, true)
            .await?
            .filter(|bundle| !bundle.is_empty())
            .ok_or_else(|| Error::NoRouteFound {
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount.clone(),
            })?;
        debug!(
            "{} candidate routes, quoted {} -> {}",
            bundle.routes.len(),
            bundle.amount_in,
            bundle.amount_out
        );

        // Building
        *stage = SwapStage::Building;
        ensure_active(cancel)?;
        let mut draft = TransactionDraft::new(
            request.wallet.address.clone(),
            request.provisional_gas_budget.clone(),
        );
        for _ in 0..request.batch {
            self.builder
                .append_swap(&mut draft, &bundle, request.slippage, true)
                .await?;
        }

        // Simulating
        *stage = SwapStage::Simulating;
        ensure_active(cancel)?;
        let provisional = self.build(&draft).await?;
        let report = self
            .chain
            .simulate(&provisional)
            .await
            .map_err(as_simulation_failure)?;
        if let ExecutionStatus::Failure(reason) = &report.status {
            return Err(Error::SimulationFailed(reason.clone()));
        }
        debug!("Dry run used {} MIST", report.gas.total());

        // Budgeting
        *stage = SwapStage::Budgeting;
        ensure_active(cancel)?;
        let budget = BudgetEstimator::estimate(&report, request.gas_margin)?;
        draft.set_gas_budget(budget.clone());
        let tx = self.build(&draft).await?;
        info!("Gas budget set to {} MIST", budget);

        // Submitting
        *stage = SwapStage::Submitting;
        ensure_active(cancel)?;
        let result = self.chain.submit(&tx, &request.wallet).await?;

        // Validating
        *stage = SwapStage::Validating;
        if let ExecutionStatus::Failure(detail) = result.status {
            return Err(Error::SubmissionRejected {
                digest: Some(result.digest),
                detail,
            });
        }

        info!(
            "Swap {} -> {} succeeded: {}",
            request.from.symbol(),
            request.to.symbol(),
            result.digest
        );

        Ok(SwapOutcome {
            digest: result.digest,
            balance_changes: result.balance_changes,
            gas_budget: budget,
            gas_used: result.gas_used,
            routes: bundle.routes.len(),
            quoted_out: bundle.amount_out,
        })
    }

    /// Build for dry run or submission; encoding faults that are not
    /// transport problems mean the transaction cannot execute
    pub(crate) async fn build(&self, draft: &TransactionDraft) -> Result<BuiltTransaction> {
        self.builder.build(draft).await.map_err(as_simulation_failure)
    }
}

pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn as_simulation_failure(e: Error) -> Error {
    match e.kind() {
        ErrorKind::Transient | ErrorKind::Cancelled | ErrorKind::SimulationFailed => e,
        _ => Error::SimulationFailed(e.to_string()),
    }
}
