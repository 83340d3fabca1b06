//! Plain coin transfers
//!
//! Used to fund disposable wallets with a gas stipend. Transfers carry a
//! fixed budget and are not dry-run first.

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::orchestrator::{ensure_active, SwapOrchestrator};
use crate::error::{Error, Result};
use crate::types::{Address, Amount, Asset, ExecutionStatus, GasCost, TransactionDraft};
use crate::wallet::Wallet;

/// One transfer from `wallet` to `recipient`
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub wallet: Wallet,
    pub recipient: Address,
    pub asset: Asset,
    pub amount: Amount,
    pub gas_budget: Amount,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub digest: String,
    pub gas_used: GasCost,
}

impl SwapOrchestrator {
    /// Build, sign, submit and validate a transfer
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        if request.amount.is_zero() {
            return Err(Error::InvalidAmount("transfer amount must be positive".into()));
        }

        let mut draft =
            TransactionDraft::new(request.wallet.address.clone(), request.gas_budget.clone());
        self.builder
            .append_transfer(&mut draft, &request.recipient, &request.asset, &request.amount)
            .await?;
        let tx = self.builder.build(&draft).await?;

        ensure_active(cancel)?;
        let result = self.chain.submit(&tx, &request.wallet).await?;

        if let ExecutionStatus::Failure(detail) = result.status {
            return Err(Error::SubmissionRejected {
                digest: Some(result.digest),
                detail,
            });
        }

        info!(
            "Transferred {} {} to {}: {}",
            request.amount,
            request.asset.symbol(),
            request.recipient.short(),
            result.digest
        );

        Ok(TransferOutcome {
            digest: result.digest,
            gas_used: result.gas_used,
        })
    }
}
