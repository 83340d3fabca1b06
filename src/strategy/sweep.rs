//! Sell every non-base holding into the base asset
//!
//! Each asset is swapped on its own; a failure is logged and recorded and
//! the sweep moves on to the next asset.

use tracing::{info, warn};

use super::StrategyContext;
use crate::error::{ErrorKind, Result};
use crate::trading::orchestrator::ensure_active;
use crate::types::{Amount, Asset, SUI_DECIMALS};

#[derive(Debug, Clone)]
pub struct SweptAsset {
    pub asset: Asset,
    pub amount: Amount,
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct FailedAsset {
    pub asset: Asset,
    pub amount: Amount,
    pub kind: ErrorKind,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub swept: Vec<SweptAsset>,
    pub failed: Vec<FailedAsset>,
    /// Base balance once the sweep finished; `None` if it could not be read
    pub final_base_balance: Option<Amount>,
    pub cancelled: bool,
}

impl SweepSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Holdings the sweep would sell: positive, non-base balances
pub async fn candidates(ctx: &StrategyContext) -> Result<Vec<(Asset, Amount)>> {
    let held = ctx.chain.all_balances(&ctx.main_wallet.address).await?;
    Ok(held
        .into_iter()
        .filter(|(asset, amount)| asset != ctx.base_asset() && !amount.is_zero())
        .collect())
}

pub async fn run(ctx: &StrategyContext) -> Result<SweepSummary> {
    let cfg = &ctx.config.sweep;
    let wallet = &ctx.main_wallet;
    let base = ctx.base_asset();

    let holdings = candidates(ctx).await?;
    info!("Found {} assets to sell", holdings.len());

    let mut summary = SweepSummary::default();
    for (asset, amount) in holdings {
        if ensure_active(&ctx.cancel).is_err() {
            summary.cancelled = true;
            break;
        }

        info!("Selling {} {}", amount, asset);
        let request = ctx.swap_request(
            wallet,
            &asset,
            base,
            amount.clone(),
            1,
            cfg.gas_margin,
            &cfg.provisional_gas_budget,
        );

        match ctx.orchestrator.execute(&request, &ctx.cancel).await {
            Ok(outcome) => summary.swept.push(SweptAsset {
                asset,
                amount,
                digest: outcome.digest,
            }),
            Err(failure) if failure.kind() == ErrorKind::Cancelled => {
                summary.cancelled = true;
                break;
            }
            Err(failure) => {
                warn!("Skipping {}: {}", asset, failure.source);
                summary.failed.push(FailedAsset {
                    asset,
                    amount,
                    kind: failure.kind(),
                    error: failure.source.to_string(),
                });
            }
        }
    }

    // The swaps are already on chain; a failed read must not lose the summary
    ctx.cache.invalidate_address(&wallet.address);
    summary.final_base_balance = match ctx.cache.get(&wallet.address, base).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!("Could not read final {} balance: {}", base.symbol(), e);
            None
        }
    };

    info!(
        "Sweep finished: {} sold, {} failed, {} {} remaining",
        summary.swept.len(),
        summary.failed.len(),
        summary
            .final_base_balance
            .as_ref()
            .map(|b| b.display_units(SUI_DECIMALS))
            .unwrap_or_else(|| "unknown".to_string()),
        base.symbol()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{context, main_wallet, test_config};
    use crate::testing::StubVenue;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_partial_failure_summary() {
        let venue = Arc::new(StubVenue::new());
        let owner = main_wallet().address;
        let good: Asset = "0xaaa::good::GOOD".parse().unwrap();
        let illiquid: Asset = "0xbbb::dust::DUST".parse().unwrap();
        let broken: Asset = "0xccc::rug::RUG".parse().unwrap();

        venue.set_balance(&owner, &Asset::sui(), 100_000_000);
        venue.set_balance(&owner, &good, 500);
        venue.set_balance(&owner, &illiquid, 7);
        venue.set_balance(&owner, &broken, 9);
        venue.set_balance(&owner, &"0xddd::zero::ZERO".parse().unwrap(), 0);
        venue.remove_route(&illiquid, &Asset::sui());
        venue.fail_simulation_for(&broken);

        let ctx = context(&venue, test_config());
        let summary = run(&ctx).await.unwrap();

        assert_eq!(summary.swept.len(), 1);
        assert_eq!(summary.swept[0].asset, good);
        assert_eq!(summary.failed.len(), 2);
        assert!(summary
            .failed
            .iter()
            .any(|f| f.asset == illiquid && f.kind == ErrorKind::NoRouteFound));
        assert!(summary
            .failed
            .iter()
            .any(|f| f.asset == broken && f.kind == ErrorKind::SimulationFailed));
        assert!(!summary.is_clean());
        assert_eq!(venue.calls.submit(), 1);
        assert_eq!(summary.final_base_balance, Some(venue.balance(&owner, &Asset::sui())));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_assets() {
        let venue = Arc::new(StubVenue::new());
        let owner = main_wallet().address;
        // Sorted first, so it is the first asset the sweep tries
        let first: Asset = "0x0a::rug::RUG".parse().unwrap();
        let second: Asset = "0xb1::good::GOOD".parse().unwrap();
        let third: Asset = "0xc1::fine::FINE".parse().unwrap();

        venue.set_balance(&owner, &Asset::sui(), 100_000_000);
        venue.set_balance(&owner, &first, 3);
        venue.set_balance(&owner, &second, 500);
        venue.set_balance(&owner, &third, 700);
        venue.fail_simulation_for(&first);

        let ctx = context(&venue, test_config());
        let held: Vec<Asset> = candidates(&ctx).await.unwrap().into_iter().map(|(a, _)| a).collect();
        assert_eq!(held, vec![first.clone(), second.clone(), third.clone()]);

        let summary = run(&ctx).await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].asset, first);
        assert_eq!(summary.failed[0].kind, ErrorKind::SimulationFailed);
        let sold: Vec<&Asset> = summary.swept.iter().map(|s| &s.asset).collect();
        assert_eq!(sold, vec![&second, &third]);
        assert_eq!(venue.calls.submit(), 2);
        assert!(venue.balance(&owner, &second).is_zero());
        assert!(venue.balance(&owner, &third).is_zero());
    }

    #[tokio::test]
    async fn test_summary_survives_failed_final_read() {
        let venue = Arc::new(StubVenue::new());
        let owner = main_wallet().address;
        let good: Asset = "0xaaa::good::GOOD".parse().unwrap();
        venue.set_balance(&owner, &Asset::sui(), 100_000_000);
        venue.set_balance(&owner, &good, 500);
        venue.fail_next_balance_queries(1);

        let ctx = context(&venue, test_config());
        let summary = run(&ctx).await.unwrap();

        assert_eq!(summary.swept.len(), 1);
        assert_eq!(summary.swept[0].asset, good);
        assert!(summary.final_base_balance.is_none());
        assert_eq!(venue.calls.submit(), 1);
        assert_eq!(venue.calls.balance(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_sweep() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 42);
        let ctx = context(&venue, test_config());

        assert!(candidates(&ctx).await.unwrap().is_empty());
        let summary = run(&ctx).await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.final_base_balance, Some(Amount::from(42u64)));
    }
}
