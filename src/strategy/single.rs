//! Single swap for a fixed pair

use tracing::info;

use super::StrategyContext;
use crate::error::Result;
use crate::trading::{drive, Attempts, DriveReport, SwapOutcome};
use crate::types::{Amount, SUI_DECIMALS};

#[derive(Debug, Clone)]
pub struct SingleSwapReport {
    pub outcome: SwapOutcome,
    /// `(from, to)` balances before the swap, if they could be read
    pub before: Option<(Amount, Amount)>,
    /// `(from, to)` balances after the swap, if they could be read
    pub after: Option<(Amount, Amount)>,
}

/// One swap of `single.amount` (x `single.batch`). Balance reads around
/// the swap are informational and never fail it.
pub async fn run_once(ctx: &StrategyContext) -> Result<SingleSwapReport> {
    let cfg = &ctx.config.single;
    let wallet = &ctx.main_wallet;

    let before = ctx.observe(&wallet.address, &cfg.from, &cfg.to).await;
    if let Some((from, to)) = &before {
        info!(
            "Before: {} {} / {} {}",
            from.display_units(SUI_DECIMALS),
            cfg.from.symbol(),
            to,
            cfg.to.symbol()
        );
    }

    let request = ctx.swap_request(
        wallet,
        &cfg.from,
        &cfg.to,
        cfg.amount.clone(),
        cfg.batch,
        cfg.gas_margin,
        &cfg.provisional_gas_budget,
    );
    let outcome = ctx.orchestrator.execute(&request, &ctx.cancel).await?;
    ctx.cache.invalidate_address(&wallet.address);

    let after = ctx.observe(&wallet.address, &cfg.from, &cfg.to).await;
    match &after {
        Some((from, to)) => info!(
            "After: {} {} / {} {} (digest {})",
            from.display_units(SUI_DECIMALS),
            cfg.from.symbol(),
            to,
            cfg.to.symbol(),
            outcome.digest
        ),
        None => info!("Swap executed (digest {})", outcome.digest),
    }

    Ok(SingleSwapReport {
        outcome,
        before,
        after,
    })
}

/// Repeat the single swap until stopped
pub async fn run_forever(ctx: &StrategyContext) -> Result<DriveReport> {
    let policy = ctx.trading_policy(Attempts::Infinite);
    drive("swap", &policy, &ctx.cancel, |_| run_once(ctx)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::strategy::test_support::{context, main_wallet, test_config, token};
    use crate::testing::StubVenue;
    use crate::types::Asset;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_single_swap_reports_balances() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 5_000_000_000);
        venue.set_rate(&Asset::sui(), &token(), 2, 1);
        let ctx = context(&venue, test_config());

        let report = run_once(&ctx).await.unwrap();
        let before = report.before.unwrap();
        let after = report.after.unwrap();

        assert_eq!(before.1, Amount::zero());
        assert_eq!(after.1, Amount::from(2_000_000_000u64));
        assert!(after.0 < before.0);
        assert_eq!(venue.calls.submit(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_before_swap_does_not_block_it() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 5_000_000_000);
        venue.fail_next_balance_queries(1);
        let ctx = context(&venue, test_config());

        let report = run_once(&ctx).await.unwrap();

        assert!(report.before.is_none());
        assert!(report.after.is_some());
        assert_eq!(venue.calls.submit(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_after_swap_keeps_outcome() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 5_000_000_000);
        // Both pre-swap reads succeed, the first post-swap read fails
        venue.fail_balance_queries_after(2, 1);
        let ctx = context(&venue, test_config());

        let report = run_once(&ctx).await.unwrap();

        assert!(report.before.is_some());
        assert!(report.after.is_none());
        assert_eq!(report.outcome.digest, "digest-1");
        assert_eq!(venue.balance(&main_wallet().address, &token()), Amount::from(1_000_000_000u64));
    }

    #[tokio::test]
    async fn test_no_route_is_reported() {
        let venue = Arc::new(StubVenue::new());
        venue.remove_route(&Asset::sui(), &token());
        let ctx = context(&venue, test_config());

        let err = run_once(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoRouteFound);
        assert_eq!(venue.calls.submit(), 0);
    }
}
