//! Trading strategies
//!
//! Each strategy reads balances through the shared cache, decides which
//! swaps to make and hands every swap to the orchestrator:
//! - `single` - one swap for a fixed pair and amount
//! - `sweep` - sell every non-base holding into the base asset
//! - `round_trip` - buy a target and sell the whole position back
//! - `volume` - a fixed number of buy/sell rounds
//! - `relay` - one swap per freshly funded disposable wallet

pub mod relay;
pub mod round_trip;
pub mod single;
pub mod sweep;
pub mod volume;

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::BalanceCache;
use crate::chain::{ChainClient, WalletFactory};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::trading::{Attempts, RetryPolicy, SwapOrchestrator, SwapRequest};
use crate::types::{Address, Amount, Asset};
use crate::wallet::{UsedAddresses, Wallet};

pub use relay::RelayReport;
pub use round_trip::RoundTripReport;
pub use single::SingleSwapReport;
pub use sweep::SweepSummary;
pub use volume::{RoundOutcome, VolumeSummary};

/// Everything a strategy needs, shared for the lifetime of the process
#[derive(Clone)]
pub struct StrategyContext {
    pub config: Arc<Config>,
    pub orchestrator: Arc<SwapOrchestrator>,
    pub cache: Arc<BalanceCache>,
    pub chain: Arc<dyn ChainClient>,
    pub wallets: Arc<dyn WalletFactory>,
    pub used_addresses: Arc<UsedAddresses>,
    pub main_wallet: Wallet,
    pub cancel: CancellationToken,
}

impl StrategyContext {
    pub fn base_asset(&self) -> &Asset {
        &self.config.trading.base_asset
    }

    /// Swap request for `wallet` using the configured slippage
    pub fn swap_request(
        &self,
        wallet: &Wallet,
        from: &Asset,
        to: &Asset,
        amount: Amount,
        batch: u32,
        gas_margin: Decimal,
        provisional_gas_budget: &Amount,
    ) -> SwapRequest {
        SwapRequest {
            wallet: wallet.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
            batch,
            slippage: self.config.trading.slippage,
            gas_margin,
            provisional_gas_budget: provisional_gas_budget.clone(),
        }
    }

    /// Both balances, queried concurrently
    pub async fn snapshot(&self, address: &Address, a: &Asset, b: &Asset) -> Result<(Amount, Amount)> {
        let (first, second) = tokio::join!(self.cache.get(address, a), self.cache.get(address, b));
        Ok((first?, second?))
    }

    /// `snapshot` for reporting only: a failed read is logged and yields `None`
    pub async fn observe(&self, address: &Address, a: &Asset, b: &Asset) -> Option<(Amount, Amount)> {
        match self.snapshot(address, a, b).await {
            Ok(balances) => Some(balances),
            Err(e) => {
                warn!("Balance snapshot unavailable: {}", e);
                None
            }
        }
    }

    /// Loop policy from the shared trading delays
    pub fn trading_policy(&self, attempts: Attempts) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_millis(self.config.trading.success_delay_ms),
            Duration::from_millis(self.config.trading.error_delay_ms),
        )
    }

    /// Fail with `InsufficientBalance` unless `available > reserve` and
    /// `available - reserve >= spend`
    pub fn ensure_spendable(
        &self,
        address: &Address,
        asset: &Asset,
        available: &Amount,
        spend: &Amount,
        reserve: &Amount,
    ) -> Result<()> {
        let spendable = available.checked_sub(reserve).filter(|s| !s.is_zero());
        match spendable {
            Some(s) if &s >= spend => Ok(()),
            _ => Err(Error::InsufficientBalance {
                address: address.clone(),
                asset: asset.clone(),
                available: available.clone(),
                required: spend + reserve,
            }),
        }
    }
}
