//! CLI command implementations

use anyhow::Result;
use chrono::Utc;
use dialoguer::Confirm;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::BalanceCache;
use crate::chain::{AggregatorClient, SuiRpcClient, TxServiceClient, WalletFactory};
use crate::config::Config;
use crate::strategy::relay::Relay;
use crate::strategy::{round_trip, single, sweep, volume, RoundOutcome, StrategyContext};
use crate::trading::{DriveReport, SwapOrchestrator};
use crate::types::SUI_DECIMALS;
use crate::wallet::UsedAddresses;

/// Cancellation token tripped by Ctrl-C
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current step");
            trigger.cancel();
        }
    });
    token
}

/// Wire adapters, restore the main wallet and build the strategy context
pub async fn connect(config: &Config) -> Result<StrategyContext> {
    let secret = config.secret_key()?;

    let tx_service = Arc::new(TxServiceClient::new(config.tx_service.clone())?);
    let rpc = Arc::new(SuiRpcClient::new(config.rpc.clone(), tx_service.clone())?);
    let aggregator = Arc::new(AggregatorClient::new(config.aggregator.clone())?);

    let main_wallet = tx_service.restore(&secret).await?;
    info!("Sender address: {}", main_wallet.address);

    let orchestrator = SwapOrchestrator::new(aggregator, tx_service.clone(), rpc.clone());
    let cache = BalanceCache::new(rpc.clone(), config.trading.cache_window());

    Ok(StrategyContext {
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(orchestrator),
        cache: Arc::new(cache),
        chain: rpc,
        wallets: tx_service,
        used_addresses: Arc::new(UsedAddresses::new()),
        main_wallet,
        cancel: shutdown_token(),
    })
}

fn print_drive_report(name: &str, report: &DriveReport) {
    println!("\n=== {} ({}) ===", name.to_uppercase(), Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Iterations: {}", report.iterations());
    println!("  Succeeded: {}", report.succeeded);
    println!("  Failed: {}", report.failed);
    if let Some(e) = &report.last_error {
        println!("  Last error: {}", e);
    }
    if report.cancelled {
        println!("Stopped by user");
    }
}

/// One swap, or repeated swaps until Ctrl-C
pub async fn swap(config: &Config, forever: bool) -> Result<()> {
    let ctx = connect(config).await?;

    if forever {
        let report = single::run_forever(&ctx).await?;
        print_drive_report("swap", &report);
        return Ok(());
    }

    let report = single::run_once(&ctx).await?;
    println!("\n=== SWAP ===\n");
    println!("Digest: {}", report.outcome.digest);
    println!("Routes: {}", report.outcome.routes);
    println!("Gas budget: {} MIST", report.outcome.gas_budget);
    match (&report.before, &report.after) {
        (Some(before), Some(after)) => {
            println!("{}: {} -> {}", config.single.from.symbol(), before.0, after.0);
            println!("{}: {} -> {}", config.single.to.symbol(), before.1, after.1);
        }
        _ => println!("Balances unavailable"),
    }
    Ok(())
}

/// Sell every non-base holding
pub async fn sweep(config: &Config, force: bool) -> Result<()> {
    let ctx = connect(config).await?;

    let holdings = sweep::candidates(&ctx).await?;
    if holdings.is_empty() {
        println!("Nothing to sell.");
        return Ok(());
    }

    println!("\nAssets to sell:");
    for (asset, amount) in &holdings {
        println!("  {} {}", amount, asset);
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Sell {} assets into {}? This cannot be undone.",
                holdings.len(),
                config.trading.base_asset.symbol()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Sweep cancelled by user");
            return Ok(());
        }
    }

    let summary = sweep::run(&ctx).await?;

    println!("\n=== SWEEP ===\n");
    for swept in &summary.swept {
        println!("  SOLD   {} {} ({})", swept.amount, swept.asset, swept.digest);
    }
    for failed in &summary.failed {
        println!("  FAILED {} {} [{}] {}", failed.amount, failed.asset, failed.kind, failed.error);
    }
    match &summary.final_base_balance {
        Some(balance) => println!(
            "\nFinal {} balance: {}",
            config.trading.base_asset.symbol(),
            balance.display_units(SUI_DECIMALS)
        ),
        None => println!(
            "\nFinal {} balance unavailable",
            config.trading.base_asset.symbol()
        ),
    }
    if summary.cancelled {
        warn!("Sweep interrupted before all assets were processed");
    }
    Ok(())
}

pub async fn round_trip(config: &Config, iterations: Option<u64>) -> Result<()> {
    let ctx = connect(config).await?;
    let report = round_trip::run(&ctx, iterations).await?;
    print_drive_report("round trip", &report);
    Ok(())
}

pub async fn volume(config: &Config, forever: bool) -> Result<()> {
    let ctx = connect(config).await?;

    if forever {
        let report = volume::run_forever(&ctx).await?;
        print_drive_report("volume", &report);
        return Ok(());
    }

    let summary = volume::run_rounds(&ctx, false).await?;
    println!("\n=== VOLUME ===\n");
    for (i, round) in summary.rounds.iter().enumerate() {
        match round {
            RoundOutcome::Completed {
                buy_digest,
                sell_digest,
                sold,
            } => println!("  Round {}: OK bought {} / sold {} ({})", i + 1, buy_digest, sold, sell_digest),
            RoundOutcome::Failed { kind, error } => {
                println!("  Round {}: FAILED [{}] {}", i + 1, kind, error)
            }
        }
    }
    println!(
        "\nCompleted {}/{} rounds",
        summary.completed(),
        summary.rounds.len()
    );
    Ok(())
}

pub async fn relay(config: &Config, iterations: Option<u64>) -> Result<()> {
    let ctx = connect(config).await?;
    let relay = Relay::new(ctx);
    let report = relay.run(iterations).await?;
    print_drive_report("relay", &report);
    Ok(())
}

/// Show every balance held by the main wallet
pub async fn balances(config: &Config) -> Result<()> {
    let ctx = connect(config).await?;
    let address = &ctx.main_wallet.address;

    // Configured strategy targets are shown even when not held
    let mut tracked = vec![
        config.trading.base_asset.clone(),
        config.single.to.clone(),
        config.round_trip.target.clone(),
        config.volume.target.clone(),
        config.relay.target.clone(),
    ];
    tracked.sort();
    tracked.dedup();

    let lookups = tracked.iter().map(|asset| ctx.cache.get(address, asset));
    let results = futures::future::join_all(lookups).await;

    println!("\n=== BALANCES {} ===\n", address);
    for (asset, result) in tracked.iter().zip(results) {
        match result {
            Ok(amount) => println!("  {:<12} {}", asset.symbol(), amount),
            Err(e) => println!("  {:<12} error: {}", asset.symbol(), e),
        }
    }

    let held = ctx.chain.all_balances(address).await?;
    let others: Vec<_> = held
        .iter()
        .filter(|(asset, _)| !tracked.contains(asset))
        .collect();
    if !others.is_empty() {
        println!("\nOther holdings:");
        for (asset, amount) in others {
            println!("  {} {}", amount, asset);
        }
    }
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
