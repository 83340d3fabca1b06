//! Configuration loading and validation

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::types::{Amount, Asset};
use crate::wallet::SecretKey;

/// Environment variable holding the bech32 private key
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY_BECH32";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub tx_service: TxServiceConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub single: SingleSwapConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub round_trip: RoundTripConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum hops per route
    #[serde(default = "default_route_depth")]
    pub depth: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// Local service that encodes drafts, signs and creates keypairs
#[derive(Debug, Clone, Deserialize)]
pub struct TxServiceConfig {
    #[serde(default = "default_tx_service_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TxServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tx_service_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Asset every strategy measures against
    #[serde(default = "Asset::sui")]
    pub base_asset: Asset,
    /// Accepted execution shortfall vs. the quote (0.05 = 5%)
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    #[serde(default = "default_cache_window_ms")]
    pub balance_cache_window_ms: u64,
    /// Pause after a successful iteration
    #[serde(default = "default_success_delay_ms")]
    pub success_delay_ms: u64,
    /// Pause after a failed iteration
    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            base_asset: Asset::sui(),
            slippage: default_slippage(),
            balance_cache_window_ms: default_cache_window_ms(),
            success_delay_ms: default_success_delay_ms(),
            error_delay_ms: default_error_delay_ms(),
        }
    }
}

impl TradingConfig {
    pub fn cache_window(&self) -> Duration {
        Duration::from_millis(self.balance_cache_window_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SingleSwapConfig {
    #[serde(default = "Asset::sui")]
    pub from: Asset,
    #[serde(default = "default_single_target")]
    pub to: Asset,
    #[serde(default = "default_single_amount")]
    pub amount: Amount,
    /// Identical swaps folded into one transaction
    #[serde(default = "default_one")]
    pub batch: u32,
    #[serde(default = "default_gas_margin")]
    pub gas_margin: Decimal,
    #[serde(default = "default_small_gas_budget")]
    pub provisional_gas_budget: Amount,
}

impl Default for SingleSwapConfig {
    fn default() -> Self {
        Self {
            from: Asset::sui(),
            to: default_single_target(),
            amount: default_single_amount(),
            batch: 1,
            gas_margin: default_gas_margin(),
            provisional_gas_budget: default_small_gas_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_gas_margin")]
    pub gas_margin: Decimal,
    #[serde(default = "default_small_gas_budget")]
    pub provisional_gas_budget: Amount,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            gas_margin: default_sweep_gas_margin(),
            provisional_gas_budget: default_small_gas_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoundTripConfig {
    #[serde(default = "default_round_trip_target")]
    pub target: Asset,
    /// Base amount per swap
    #[serde(default = "default_round_trip_amount")]
    pub amount: Amount,
    #[serde(default = "default_round_trip_batch")]
    pub batch: u32,
    /// Base balance that must stay untouched for gas
    #[serde(default = "default_min_base_reserve")]
    pub min_base_reserve: Amount,
    #[serde(default = "default_gas_margin")]
    pub gas_margin: Decimal,
    #[serde(default = "default_large_gas_budget")]
    pub provisional_gas_budget: Amount,
}

impl Default for RoundTripConfig {
    fn default() -> Self {
        Self {
            target: default_round_trip_target(),
            amount: default_round_trip_amount(),
            batch: default_round_trip_batch(),
            min_base_reserve: default_min_base_reserve(),
            gas_margin: default_gas_margin(),
            provisional_gas_budget: default_large_gas_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    #[serde(default = "default_volume_target")]
    pub target: Asset,
    #[serde(default = "default_volume_amount")]
    pub amount: Amount,
    #[serde(default = "default_volume_rounds")]
    pub rounds: u32,
    /// Pause between the buy and the sell of one round
    #[serde(default = "default_trade_delay_ms")]
    pub trade_delay_ms: u64,
    /// Pause between rounds
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,
    #[serde(default = "default_gas_margin")]
    pub gas_margin: Decimal,
    #[serde(default = "default_small_gas_budget")]
    pub provisional_gas_budget: Amount,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            target: default_volume_target(),
            amount: default_volume_amount(),
            rounds: default_volume_rounds(),
            trade_delay_ms: default_trade_delay_ms(),
            round_delay_ms: default_round_delay_ms(),
            gas_margin: default_gas_margin(),
            provisional_gas_budget: default_small_gas_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_target")]
    pub target: Asset,
    #[serde(default = "default_relay_amount")]
    pub amount: Amount,
    /// Gas handed to each disposable wallet
    #[serde(default = "default_gas_stipend")]
    pub gas_stipend: Amount,
    /// Main wallet must hold more than this before each iteration
    #[serde(default = "default_min_main_balance")]
    pub min_main_balance: Amount,
    #[serde(default = "default_transfer_gas_budget")]
    pub transfer_gas_budget: Amount,
    #[serde(default = "default_relay_gas_budget")]
    pub provisional_gas_budget: Amount,
    #[serde(default = "default_gas_margin")]
    pub gas_margin: Decimal,
    #[serde(default = "default_relay_cache_window_ms")]
    pub balance_cache_window_ms: u64,
    #[serde(default = "default_relay_success_delay_ms")]
    pub success_delay_ms: u64,
    #[serde(default = "default_relay_error_delay_ms")]
    pub error_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target: default_relay_target(),
            amount: default_relay_amount(),
            gas_stipend: default_gas_stipend(),
            min_main_balance: default_min_main_balance(),
            transfer_gas_budget: default_transfer_gas_budget(),
            provisional_gas_budget: default_relay_gas_budget(),
            gas_margin: default_gas_margin(),
            balance_cache_window_ms: default_relay_cache_window_ms(),
            success_delay_ms: default_relay_success_delay_ms(),
            error_delay_ms: default_relay_error_delay_ms(),
        }
    }
}

// Default value functions
fn default_aggregator_endpoint() -> String {
    std::env::var("AGGREGATOR_RPC_URL_MAINNET").unwrap_or_default()
}

fn default_rpc_endpoint() -> String {
    std::env::var("FULLNODE_RPC_URL_MAINNET").unwrap_or_default()
}

fn default_tx_service_endpoint() -> String {
    std::env::var("TX_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:9100".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_rpc_timeout_ms() -> u64 {
    15000
}

fn default_route_depth() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_slippage() -> Decimal {
    Decimal::new(5, 2)
}

fn default_gas_margin() -> Decimal {
    Decimal::new(12, 1)
}

fn default_sweep_gas_margin() -> Decimal {
    Decimal::new(11, 1)
}

fn default_cache_window_ms() -> u64 {
    5000
}

fn default_success_delay_ms() -> u64 {
    1000
}

fn default_error_delay_ms() -> u64 {
    2000
}

fn default_one() -> u32 {
    1
}

fn default_small_gas_budget() -> Amount {
    Amount::from(10_000_000u64)
}

fn default_large_gas_budget() -> Amount {
    Amount::from(250_000_000u64)
}

fn default_single_target() -> Asset {
    parse_default_asset("0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN")
}

fn default_single_amount() -> Amount {
    Amount::from(1_000_000_000u64)
}

fn default_round_trip_target() -> Asset {
    parse_default_asset("0xbc858cb910b9914bee64fff0f9b38855355a040c49155a17b265d9086d256545::but::BUT")
}

fn default_round_trip_amount() -> Amount {
    Amount::from(10u64)
}

fn default_round_trip_batch() -> u32 {
    80
}

fn default_min_base_reserve() -> Amount {
    Amount::from(1_000_000u64)
}

fn default_volume_target() -> Asset {
    parse_default_asset("0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN")
}

fn default_volume_amount() -> Amount {
    Amount::from(1_000_000_000u64)
}

fn default_volume_rounds() -> u32 {
    10
}

fn default_trade_delay_ms() -> u64 {
    2000
}

fn default_round_delay_ms() -> u64 {
    3000
}

fn default_relay_target() -> Asset {
    parse_default_asset("0x7bf4c6013b747eea7a0db8cfa6fc7a841075e341f220ef64fe3306b8b854b57d::dogiz::DOGIZ")
}

fn default_relay_amount() -> Amount {
    Amount::from(10u64)
}

fn default_gas_stipend() -> Amount {
    Amount::from(2_000_000u64)
}

fn default_min_main_balance() -> Amount {
    Amount::from(10_000_000u64)
}

fn default_transfer_gas_budget() -> Amount {
    Amount::from(50_000_000u64)
}

fn default_relay_gas_budget() -> Amount {
    Amount::from(110_000_000u64)
}

fn default_relay_cache_window_ms() -> u64 {
    2000
}

fn default_relay_success_delay_ms() -> u64 {
    500
}

fn default_relay_error_delay_ms() -> u64 {
    1000
}

fn parse_default_asset(s: &str) -> Asset {
    s.parse().unwrap_or_else(|_| Asset::sui())
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("aggregator.endpoint", default_aggregator_endpoint())?
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_rpc_timeout_ms() as i64)?
            .set_default("rpc.max_retries", default_max_retries() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SWAPBOT_)
            .add_source(
                config::Environment::with_prefix("SWAPBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_endpoint("aggregator.endpoint", &self.aggregator.endpoint)?;
        validate_endpoint("rpc.endpoint", &self.rpc.endpoint)?;
        validate_endpoint("tx_service.endpoint", &self.tx_service.endpoint)?;

        if self.trading.slippage < Decimal::ZERO || self.trading.slippage >= Decimal::ONE {
            anyhow::bail!("trading.slippage must be in [0, 1), got {}", self.trading.slippage);
        }

        let margins = [
            ("single.gas_margin", self.single.gas_margin),
            ("sweep.gas_margin", self.sweep.gas_margin),
            ("round_trip.gas_margin", self.round_trip.gas_margin),
            ("volume.gas_margin", self.volume.gas_margin),
            ("relay.gas_margin", self.relay.gas_margin),
        ];
        for (name, margin) in margins {
            if margin < Decimal::ONE {
                anyhow::bail!("{} must be at least 1.0, got {}", name, margin);
            }
        }

        if self.single.batch == 0 || self.round_trip.batch == 0 {
            anyhow::bail!("batch sizes must be at least 1");
        }

        if self.volume.rounds == 0 {
            anyhow::bail!("volume.rounds must be at least 1");
        }

        let amounts = [
            ("single.amount", &self.single.amount),
            ("round_trip.amount", &self.round_trip.amount),
            ("volume.amount", &self.volume.amount),
            ("relay.amount", &self.relay.amount),
            ("relay.gas_stipend", &self.relay.gas_stipend),
        ];
        for (name, amount) in amounts {
            if amount.is_zero() {
                anyhow::bail!("{} must be positive", name);
            }
        }

        if self.single.from == self.single.to {
            anyhow::bail!("single.from and single.to must differ");
        }

        Ok(())
    }

    /// Read and validate the signing key from the environment
    pub fn secret_key(&self) -> crate::error::Result<SecretKey> {
        let raw = std::env::var(PRIVATE_KEY_ENV)
            .map_err(|_| crate::error::Error::MissingEnvVar(PRIVATE_KEY_ENV.to_string()))?;
        SecretKey::parse(&raw)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Aggregator:
    endpoint: {}
    depth: {}
  RPC:
    endpoint: {}
    timeout: {}ms
    max_retries: {}
  Tx service:
    endpoint: {}
  Trading:
    base_asset: {}
    slippage: {}
    cache_window: {}ms
  Round trip:
    target: {}
    amount: {} x {}
    min_base_reserve: {}
  Volume:
    target: {}
    rounds: {}
  Relay:
    target: {}
    gas_stipend: {}
    min_main_balance: {}
  Private key: {}
"#,
            mask_url(&self.aggregator.endpoint),
            self.aggregator.depth,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.rpc.max_retries,
            mask_url(&self.tx_service.endpoint),
            self.trading.base_asset,
            self.trading.slippage,
            self.trading.balance_cache_window_ms,
            self.round_trip.target,
            self.round_trip.amount,
            self.round_trip.batch,
            self.round_trip.min_base_reserve,
            self.volume.target,
            self.volume.rounds,
            self.relay.target,
            self.relay.gas_stipend,
            self.relay.min_main_balance,
            if std::env::var(PRIVATE_KEY_ENV).is_ok() {
                "***"
            } else {
                "(not set)"
            },
        )
    }
}

fn validate_endpoint(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{} must be set", name);
    }
    url::Url::parse(value).with_context(|| format!("Invalid {}: {}", name, value))?;
    Ok(())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
