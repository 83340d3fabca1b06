//! Buy a target asset and sell the whole position back
//!
//! The sell leg always uses a freshly queried target balance, never the
//! quoted output of the buy.

use num_bigint::BigInt;
use tracing::{info, warn};

use super::StrategyContext;
use crate::error::{Error, Result};
use crate::trading::{drive, Attempts, DriveReport, SwapOutcome};
use crate::types::{Amount, SUI_DECIMALS};

#[derive(Debug, Clone)]
pub struct RoundTripReport {
    pub buy: SwapOutcome,
    pub sell: SwapOutcome,
    /// Target amount sold on the way back
    pub sold: Amount,
    /// Net changes over the whole trip; `None` when a balance read failed
    pub base_delta: Option<BigInt>,
    pub target_delta: Option<BigInt>,
}

pub async fn run_once(ctx: &StrategyContext) -> Result<RoundTripReport> {
    let cfg = &ctx.config.round_trip;
    let wallet = &ctx.main_wallet;
    let base = ctx.base_asset();

    // Only the base balance gates the buy
    let (base_before, target_before) = tokio::join!(
        ctx.cache.get(&wallet.address, base),
        ctx.cache.get(&wallet.address, &cfg.target)
    );
    let base_before = base_before?;
    let target_before = match target_before {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!("Target balance unavailable before buy: {}", e);
            None
        }
    };
    info!(
        "Base balance {} {}",
        base_before.display_units(SUI_DECIMALS),
        base.symbol()
    );

    let buy_request = ctx.swap_request(
        wallet,
        base,
        &cfg.target,
        cfg.amount.clone(),
        cfg.batch,
        cfg.gas_margin,
        &cfg.provisional_gas_budget,
    );
    ctx.ensure_spendable(
        &wallet.address,
        base,
        &base_before,
        &buy_request.total_in(),
        &cfg.min_base_reserve,
    )?;

    let buy = ctx.orchestrator.execute(&buy_request, &ctx.cancel).await?;
    ctx.cache.invalidate_address(&wallet.address);

    let sold = ctx.cache.get(&wallet.address, &cfg.target).await?;
    if sold.is_zero() {
        return Err(Error::InsufficientBalance {
            address: wallet.address.clone(),
            asset: cfg.target.clone(),
            available: sold,
            required: Amount::from(1u64),
        });
    }
    info!("Selling {} {}", sold, cfg.target.symbol());

    let sell_request = ctx.swap_request(
        wallet,
        &cfg.target,
        base,
        sold.clone(),
        1,
        cfg.gas_margin,
        &cfg.provisional_gas_budget,
    );
    let sell = ctx.orchestrator.execute(&sell_request, &ctx.cancel).await?;
    ctx.cache.invalidate_address(&wallet.address);

    let after = ctx.observe(&wallet.address, base, &cfg.target).await;
    let base_delta = after.as_ref().map(|(b, _)| b.delta_since(&base_before));
    let target_delta = after
        .as_ref()
        .zip(target_before.as_ref())
        .map(|((_, t), before)| t.delta_since(before));
    match (&base_delta, &target_delta) {
        (Some(b), Some(t)) => info!("Round trip done: base {:+} MIST, target {:+}", b, t),
        _ => info!("Round trip done (sell digest {})", sell.digest),
    }

    Ok(RoundTripReport {
        buy,
        sell,
        sold,
        base_delta,
        target_delta,
    })
}

/// Repeat round trips; `None` runs until stopped
pub async fn run(ctx: &StrategyContext, iterations: Option<u64>) -> Result<DriveReport> {
    let policy = ctx.trading_policy(Attempts::from(iterations));
    drive("round-trip", &policy, &ctx.cancel, |_| run_once(ctx)).await
}
