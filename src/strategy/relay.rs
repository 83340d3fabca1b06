//! Disposable-wallet relay
//!
//! Every iteration funds a brand new wallet with a small gas stipend from
//! the main wallet, performs one swap from it and then forgets it. An
//! address is never used twice within the process.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::StrategyContext;
use crate::cache::BalanceCache;
use crate::error::{Error, ErrorKind, Result};
use crate::trading::{drive, Attempts, DriveReport, RetryPolicy, SwapOutcome, TransferRequest};
use crate::types::{Address, SUI_DECIMALS};

#[derive(Debug, Clone)]
pub struct RelayReport {
    pub wallet: Address,
    pub stipend_digest: String,
    pub swap: SwapOutcome,
}

/// Relay runner with its own, shorter-lived balance cache
pub struct Relay {
    ctx: StrategyContext,
    cache: Arc<BalanceCache>,
}

impl Relay {
    pub fn new(ctx: StrategyContext) -> Self {
        let window = Duration::from_millis(ctx.config.relay.balance_cache_window_ms);
        let cache = Arc::new(BalanceCache::new(ctx.chain.clone(), window));
        Self { ctx, cache }
    }

    pub fn policy(&self, attempts: Attempts) -> RetryPolicy {
        let cfg = &self.ctx.config.relay;
        RetryPolicy::new(
            attempts,
            Duration::from_millis(cfg.success_delay_ms),
            Duration::from_millis(cfg.error_delay_ms),
        )
        .abort_on(ErrorKind::InsufficientBalance)
    }

    pub async fn run_once(&self) -> Result<RelayReport> {
        let ctx = &self.ctx;
        let cfg = &ctx.config.relay;
        let main = &ctx.main_wallet;
        let base = ctx.base_asset();

        let main_balance = self.cache.get(&main.address, base).await?;
        if main_balance <= cfg.min_main_balance {
            return Err(Error::InsufficientBalance {
                address: main.address.clone(),
                asset: base.clone(),
                available: main_balance,
                required: &cfg.min_main_balance + &cfg.gas_stipend,
            });
        }

        let disposable = ctx.wallets.generate().await?;
        if !ctx.used_addresses.claim(&disposable.address) {
            return Err(Error::WalletGeneration(format!(
                "address {} was already used",
                disposable.address
            )));
        }
        info!("Generated wallet {}", disposable.address);

        let stipend = TransferRequest {
            wallet: main.clone(),
            recipient: disposable.address.clone(),
            asset: base.clone(),
            amount: cfg.gas_stipend.clone(),
            gas_budget: cfg.transfer_gas_budget.clone(),
        };
        let funded = ctx.orchestrator.transfer(&stipend, &ctx.cancel).await?;
        self.cache.invalidate_address(&main.address);
        info!(
            "Funded {} with {} {}",
            disposable.address.short(),
            cfg.gas_stipend.display_units(SUI_DECIMALS),
            base.symbol()
        );

        let request = ctx.swap_request(
            &disposable,
            base,
            &cfg.target,
            cfg.amount.clone(),
            1,
            cfg.gas_margin,
            &cfg.provisional_gas_budget,
        );
        let swap = ctx.orchestrator.execute(&request, &ctx.cancel).await?;

        Ok(RelayReport {
            wallet: disposable.address,
            stipend_digest: funded.digest,
            swap,
        })
    }

    /// Relay iterations; `None` runs until stopped. A main wallet at or
    /// below its reserve ends the loop.
    pub async fn run(&self, iterations: Option<u64>) -> Result<DriveReport> {
        let policy = self.policy(Attempts::from(iterations));
        drive("relay", &policy, &self.ctx.cancel, |_| self.run_once()).await
    }
}
