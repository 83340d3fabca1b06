//! Volume loop: repeated buy/sell rounds against one target
//!
//! A failed round is recorded and the loop moves on. In forever mode the
//! whole batch of rounds is one iteration of the outer driver and the
//! first failure ends the batch.

use std::time::Duration;
use tracing::{info, warn};

use super::StrategyContext;
use crate::error::{Error, ErrorKind, Result};
use crate::trading::{drive, pause, Attempts, DriveReport};
use crate::types::Amount;

#[derive(Debug, Clone)]
pub enum RoundOutcome {
    Completed {
        buy_digest: String,
        sell_digest: String,
        sold: Amount,
    },
    Failed {
        kind: ErrorKind,
        error: String,
    },
}

impl RoundOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RoundOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct VolumeSummary {
    /// One entry per round that ran, in order
    pub rounds: Vec<RoundOutcome>,
    pub cancelled: bool,
}

impl VolumeSummary {
    pub fn completed(&self) -> usize {
        self.rounds.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.rounds.len() - self.completed()
    }
}

async fn round(ctx: &StrategyContext) -> Result<RoundOutcome> {
    let cfg = &ctx.config.volume;
    let wallet = &ctx.main_wallet;
    let base = ctx.base_asset();

    let buy = ctx.swap_request(
        wallet,
        base,
        &cfg.target,
        cfg.amount.clone(),
        1,
        cfg.gas_margin,
        &cfg.provisional_gas_budget,
    );
    let bought = ctx.orchestrator.execute(&buy, &ctx.cancel).await?;
    ctx.cache.invalidate_address(&wallet.address);

    if !pause(Duration::from_millis(cfg.trade_delay_ms), &ctx.cancel).await {
        return Err(Error::Cancelled);
    }

    let held = ctx.cache.get(&wallet.address, &cfg.target).await?;
    if held.is_zero() {
        return Err(Error::InsufficientBalance {
            address: wallet.address.clone(),
            asset: cfg.target.clone(),
            available: held,
            required: Amount::from(1u64),
        });
    }
    let sell = ctx.swap_request(
        wallet,
        &cfg.target,
        base,
        held.clone(),
        1,
        cfg.gas_margin,
        &cfg.provisional_gas_budget,
    );
    let sold = ctx.orchestrator.execute(&sell, &ctx.cancel).await?;
    ctx.cache.invalidate_address(&wallet.address);

    Ok(RoundOutcome::Completed {
        buy_digest: bought.digest,
        sell_digest: sold.digest,
        sold: held,
    })
}

/// Run `volume.rounds` rounds. With `fail_fast` the first failed round is
/// returned as the error.
pub async fn run_rounds(ctx: &StrategyContext, fail_fast: bool) -> Result<VolumeSummary> {
    let rounds = ctx.config.volume.rounds;
    let round_delay = Duration::from_millis(ctx.config.volume.round_delay_ms);
    let mut summary = VolumeSummary::default();

    for n in 1..=rounds {
        if ctx.cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        info!("Volume round {}/{}", n, rounds);

        match round(ctx).await {
            Ok(outcome) => summary.rounds.push(outcome),
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                summary.cancelled = true;
                break;
            }
            Err(e) if fail_fast => return Err(e),
            Err(e) => {
                warn!("Volume round {} failed: {}", n, e);
                summary.rounds.push(RoundOutcome::Failed {
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }

        if n < rounds && !pause(round_delay, &ctx.cancel).await {
            summary.cancelled = true;
            break;
        }
    }

    info!(
        "Volume finished: {} rounds completed, {} failed",
        summary.completed(),
        summary.failed()
    );
    Ok(summary)
}

/// Batches of rounds until stopped; a failure restarts the batch
pub async fn run_forever(ctx: &StrategyContext) -> Result<DriveReport> {
    let policy = ctx.trading_policy(Attempts::Infinite);
    drive("volume", &policy, &ctx.cancel, |_| run_rounds(ctx, true)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{context, main_wallet, test_config, token};
    use crate::testing::StubVenue;
    use crate::types::Asset;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_rounds_complete() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 100_000_000_000);
        venue.set_rate(&Asset::sui(), &token(), 3, 1);

        let mut config = test_config();
        config.volume.rounds = 3;
        let ctx = context(&venue, config);

        let start = tokio::time::Instant::now();
        let summary = run_rounds(&ctx, false).await.unwrap();

        assert_eq!(summary.completed(), 3);
        assert_eq!(venue.calls.submit(), 6);
        match &summary.rounds[0] {
            RoundOutcome::Completed { sold, .. } => {
                assert_eq!(sold, &Amount::from(3_000_000_000u64))
            }
            other => panic!("unexpected round: {:?}", other),
        }
        // Three trade delays and two round delays
        assert_eq!(start.elapsed(), Duration::from_millis(3 * 2000 + 2 * 3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_round_does_not_stop_loop() {
        let venue = Arc::new(StubVenue::new());
        venue.remove_route(&Asset::sui(), &token());

        let mut config = test_config();
        config.volume.rounds = 4;
        let ctx = context(&venue, config);

        let summary = run_rounds(&ctx, false).await.unwrap();
        assert_eq!(summary.rounds.len(), 4);
        assert_eq!(summary.failed(), 4);
        assert!(matches!(
            summary.rounds[3],
            RoundOutcome::Failed { kind: ErrorKind::NoRouteFound, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_bought_skips_sell() {
        let venue = Arc::new(StubVenue::new());
        venue.set_balance(&main_wallet().address, &Asset::sui(), 100_000_000_000);
        // The buy goes through but yields no target
        venue.set_rate(&Asset::sui(), &token(), 0, 1);

        let mut config = test_config();
        config.volume.rounds = 1;
        let ctx = context(&venue, config);

        let summary = run_rounds(&ctx, false).await.unwrap();
        assert!(matches!(
            summary.rounds[0],
            RoundOutcome::Failed { kind: ErrorKind::InsufficientBalance, .. }
        ));
        assert_eq!(venue.calls.resolve(), 1);
        assert_eq!(venue.calls.submit(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_propagates() {
        let venue = Arc::new(StubVenue::new());
        venue.remove_route(&Asset::sui(), &token());
        let ctx = context(&venue, test_config());

        let err = run_rounds(&ctx, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoRouteFound);
        assert_eq!(venue.calls.resolve(), 1);
    }
}
