//! Sui full-node JSON-RPC client
//!
//! Dry runs, execution and balance reads. Transport failures of reads and
//! dry runs are retried with exponential backoff up to `rpc.max_retries`;
//! execution is sent exactly once. JSON-RPC error objects are returned
//! as-is.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use num_bigint::BigInt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{check_status, ChainClient, Signer};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::types::{
    Address, Amount, Asset, BalanceChange, BuiltTransaction, ExecutionStatus, GasCost,
    SimulationReport, SubmissionResult,
};
use crate::wallet::Wallet;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    coin_type: String,
    total_balance: Amount,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasUsedResponse {
    computation_cost: Amount,
    storage_cost: Amount,
    storage_rebate: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectsResponse {
    status: StatusResponse,
    gas_used: GasUsedResponse,
}

#[derive(Debug, Deserialize)]
struct DryRunResponse {
    effects: EffectsResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceChangeResponse {
    owner: Value,
    coin_type: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    digest: String,
    effects: Option<EffectsResponse>,
    #[serde(default)]
    balance_changes: Vec<BalanceChangeResponse>,
}

impl From<StatusResponse> for ExecutionStatus {
    fn from(s: StatusResponse) -> Self {
        if s.status == "success" {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure(s.error.unwrap_or(s.status))
        }
    }
}

impl From<GasUsedResponse> for GasCost {
    fn from(g: GasUsedResponse) -> Self {
        GasCost {
            computation_cost: g.computation_cost,
            storage_cost: g.storage_cost,
            storage_rebate: g.storage_rebate,
        }
    }
}

/// Sui JSON-RPC client
pub struct SuiRpcClient {
    client: Client,
    config: RpcConfig,
    signer: Arc<dyn Signer>,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    pub fn new(config: RpcConfig, signer: Arc<dyn Signer>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build RPC client: {}", e)))?;

        info!("RPC client initialized for {}", config.endpoint);

        Ok(Self {
            client,
            config,
            signer,
            next_id: AtomicU64::new(1),
        })
    }

    /// JSON-RPC call with transport-level retry
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.retry_base_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_base_delay_ms * 8),
            max_elapsed_time: Some(Duration::from_millis(self.config.timeout_ms)),
            ..Default::default()
        };

        let max_retries = self.config.max_retries;
        let params = &params;
        let mut attempt = 0u32;

        retry(backoff, || {
            attempt += 1;
            let current = attempt;
            async move {
                match self.call_once::<T>(method, params).await {
                    Ok(value) => Ok(value),
                    Err(e @ Error::Transient(_)) if current <= max_retries => {
                        warn!("{} attempt {} failed, retrying: {}", method, current, e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, |detail| Error::Rpc {
            code: -1,
            message: detail,
        })
        .await?;

        let body: JsonRpcResponse<T> = response.json().await?;
        unwrap_rpc(method, body)
    }
}

fn unwrap_rpc<T>(method: &str, body: JsonRpcResponse<T>) -> Result<T> {
    if let Some(err) = body.error {
        return Err(Error::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| Error::Serialization(format!("{} returned neither result nor error", method)))
}

fn parse_balance_change(change: BalanceChangeResponse) -> Result<BalanceChange> {
    let owner = change
        .owner
        .get("AddressOwner")
        .and_then(Value::as_str)
        .map(Address::from_str)
        .transpose()?;
    let amount = BigInt::from_str(&change.amount)
        .map_err(|e| Error::Serialization(format!("bad balance change '{}': {}", change.amount, e)))?;

    Ok(BalanceChange {
        owner,
        asset: change.coin_type.parse()?,
        amount,
    })
}

fn parse_execution(response: ExecuteResponse) -> Result<SubmissionResult> {
    let effects = response.effects.ok_or_else(|| {
        Error::Serialization(format!("execution {} returned no effects", response.digest))
    })?;

    let balance_changes = response
        .balance_changes
        .into_iter()
        .map(parse_balance_change)
        .collect::<Result<Vec<_>>>()?;

    Ok(SubmissionResult {
        digest: response.digest,
        status: effects.status.into(),
        balance_changes,
        gas_used: effects.gas_used.into(),
    })
}

#[async_trait]
impl ChainClient for SuiRpcClient {
    async fn simulate(&self, tx: &BuiltTransaction) -> Result<SimulationReport> {
        debug!("Dry-running transaction from {}", tx.sender());

        let response: DryRunResponse = self
            .call("sui_dryRunTransactionBlock", json!([BASE64.encode(tx.bytes())]))
            .await?;

        Ok(SimulationReport {
            status: response.effects.status.into(),
            gas: response.effects.gas_used.into(),
        })
    }

    async fn submit(&self, tx: &BuiltTransaction, signer: &Wallet) -> Result<SubmissionResult> {
        let signature = self.signer.sign(tx, signer).await?;

        let params = json!([
            BASE64.encode(tx.bytes()),
            [signature],
            { "showEffects": true, "showBalanceChanges": true },
            "WaitForLocalExecution"
        ]);

        // Never resent here; a lost response is retried by the strategy loop
        let response: ExecuteResponse = match self
            .call_once("sui_executeTransactionBlock", &params)
            .await
        {
            Ok(r) => r,
            // Validators refused the transaction outright
            Err(Error::Rpc { code, message }) => {
                return Err(Error::SubmissionRejected {
                    digest: None,
                    detail: format!("RPC {}: {}", code, message),
                })
            }
            Err(e) => return Err(e),
        };

        parse_execution(response)
    }

    async fn query_balance(&self, address: &Address, asset: &Asset) -> Result<Amount> {
        let response: BalanceResponse = self
            .call(
                "suix_getBalance",
                json!([address.as_str(), asset.to_string()]),
            )
            .await?;
        debug!("Balance of {} on {}: {}", response.coin_type, address.short(), response.total_balance);
        Ok(response.total_balance)
    }

    async fn all_balances(&self, address: &Address) -> Result<Vec<(Asset, Amount)>> {
        let response: Vec<BalanceResponse> = self
            .call("suix_getAllBalances", json!([address.as_str()]))
            .await?;

        response
            .into_iter()
            .map(|b| Ok((b.coin_type.parse()?, b.total_balance)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubVenue;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    struct FixedSigner;

    #[async_trait]
    impl Signer for FixedSigner {
        async fn sign(&self, _tx: &BuiltTransaction, _wallet: &Wallet) -> Result<String> {
            Ok("c2ln".into())
        }
    }

    /// Node that accepts connections and hangs up before answering
    async fn dropping_node() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        (endpoint, accepted)
    }

    fn client(endpoint: String) -> SuiRpcClient {
        let config = RpcConfig {
            endpoint,
            timeout_ms: 5_000,
            max_retries: 2,
            retry_base_delay_ms: 1,
        };
        SuiRpcClient::new(config, Arc::new(FixedSigner)).unwrap()
    }

    #[tokio::test]
    async fn test_execute_is_sent_once() {
        let (endpoint, accepted) = dropping_node().await;
        let rpc = client(endpoint);
        let wallet = StubVenue::wallet("0xa11ce", 1);
        let tx = BuiltTransaction::new(vec![1, 2, 3], wallet.address.clone(), Amount::from(1_000u64));

        let err = rpc.submit(&tx, &wallet).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reads_are_retried() {
        let (endpoint, accepted) = dropping_node().await;
        let rpc = client(endpoint);
        let address: Address = "0xa11ce".parse().unwrap();

        let err = rpc.query_balance(&address, &Asset::sui()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parse_dry_run_failure() {
        let body: JsonRpcResponse<DryRunResponse> = serde_json::from_str(
            r#"{
                "jsonrpc": "2.0", "id": 1,
                "result": {
                    "effects": {
                        "status": {"status": "failure", "error": "InsufficientGas"},
                        "gasUsed": {"computationCost": "1000", "storageCost": "0", "storageRebate": "0"}
                    }
                }
            }"#,
        )
        .unwrap();

        let response = unwrap_rpc("sui_dryRunTransactionBlock", body).unwrap();
        let status: ExecutionStatus = response.effects.status.into();
        assert_eq!(status, ExecutionStatus::Failure("InsufficientGas".into()));
    }

    #[test]
    fn test_rpc_error_object() {
        let body: JsonRpcResponse<Value> = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "Invalid params"}}"#,
        )
        .unwrap();

        let err = unwrap_rpc("suix_getBalance", body).unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -32602, .. }));
    }

    #[test]
    fn test_parse_execution_with_balance_changes() {
        let response: ExecuteResponse = serde_json::from_str(
            r#"{
                "digest": "9xYz",
                "effects": {
                    "status": {"status": "success"},
                    "gasUsed": {"computationCost": "750000", "storageCost": "1976000", "storageRebate": "978120"}
                },
                "balanceChanges": [
                    {"owner": {"AddressOwner": "0x1"}, "coinType": "0x2::sui::SUI", "amount": "-1000000010"},
                    {"owner": {"Shared": {}}, "coinType": "0xabc::coin::COIN", "amount": "42"}
                ]
            }"#,
        )
        .unwrap();

        let result = parse_execution(response).unwrap();
        assert!(result.status.is_success());
        assert_eq!(result.digest, "9xYz");
        assert_eq!(result.balance_changes.len(), 2);
        assert_eq!(result.balance_changes[0].amount, BigInt::from(-1_000_000_010i64));
        assert!(result.balance_changes[1].owner.is_none());
        assert_eq!(result.gas_used.total(), Amount::from(3_704_120u64));
    }
}
