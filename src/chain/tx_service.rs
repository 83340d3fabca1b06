//! Transaction service client
//!
//! Encoding, signing and key generation are delegated to a local sidecar
//! that speaks plain JSON over HTTP. Drafts go in as operation lists and
//! come back as base64 transaction bytes; the bot never touches raw key
//! material beyond the encoded secret it was configured with.
//!
//! Endpoints:
//! - `POST /build` `{sender, gasBudget, operations}` -> `{txBytes}`
//! - `POST /sign` `{privateKey, txBytes}` -> `{signature}`
//! - `POST /wallets` -> `{address, privateKey}`
//! - `POST /wallets/restore` `{privateKey}` -> `{address}`

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{check_status, Signer, TransactionBuilder, WalletFactory};
use crate::config::TxServiceConfig;
use crate::error::{Error, Result};
use crate::types::{Address, Amount, BuiltTransaction, DraftOperation, TransactionDraft};
use crate::wallet::{SecretKey, Wallet};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildRequest<'a> {
    sender: &'a Address,
    gas_budget: &'a Amount,
    operations: &'a [DraftOperation],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildResponse {
    tx_bytes: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    private_key: &'a str,
    tx_bytes: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreRequest<'a> {
    private_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletResponse {
    address: Option<String>,
    private_key: Option<String>,
    error: Option<String>,
}

/// HTTP client for the transaction service
pub struct TxServiceClient {
    client: Client,
    config: TxServiceConfig,
}

impl TxServiceClient {
    pub fn new(config: TxServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build tx service client: {}", e)))?;

        info!("Transaction service client initialized for {}", config.endpoint);

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(response, Error::TxService).await?;
        Ok(response.json().await?)
    }
}

fn parse_build(response: BuildResponse, draft: &TransactionDraft) -> Result<BuiltTransaction> {
    if let Some(error) = response.error {
        return Err(Error::TransactionBuild(error));
    }

    let encoded = response
        .tx_bytes
        .ok_or_else(|| Error::TransactionBuild("service returned no transaction bytes".into()))?;
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| Error::Serialization(format!("invalid transaction bytes: {}", e)))?;

    Ok(BuiltTransaction::new(
        bytes,
        draft.sender().clone(),
        draft.gas_budget().clone(),
    ))
}

fn parse_wallet(response: WalletResponse, known_secret: Option<&SecretKey>) -> Result<Wallet> {
    if let Some(error) = response.error {
        return Err(Error::WalletGeneration(error));
    }

    let address: Address = response
        .address
        .ok_or_else(|| Error::WalletGeneration("service returned no address".into()))?
        .parse()?;

    let secret = match known_secret {
        Some(secret) => secret.clone(),
        None => {
            let encoded = response
                .private_key
                .ok_or_else(|| Error::WalletGeneration("service returned no private key".into()))?;
            SecretKey::parse(&encoded)?
        }
    };

    Ok(Wallet::new(address, secret))
}

#[async_trait]
impl TransactionBuilder for TxServiceClient {
    async fn build(&self, draft: &TransactionDraft) -> Result<BuiltTransaction> {
        if draft.is_empty() {
            return Err(Error::TransactionBuild("draft has no operations".into()));
        }

        debug!(
            "Building transaction for {} with {} operations, budget {}",
            draft.sender().short(),
            draft.operations().len(),
            draft.gas_budget()
        );

        let request = BuildRequest {
            sender: draft.sender(),
            gas_budget: draft.gas_budget(),
            operations: draft.operations(),
        };
        let response: BuildResponse = self.post("/build", &request).await?;
        parse_build(response, draft)
    }
}

#[async_trait]
impl Signer for TxServiceClient {
    async fn sign(&self, tx: &BuiltTransaction, wallet: &Wallet) -> Result<String> {
        let request = SignRequest {
            private_key: wallet.secret().expose(),
            tx_bytes: BASE64.encode(tx.bytes()),
        };
        let response: SignResponse = self.post("/sign", &request).await?;

        if let Some(error) = response.error {
            return Err(Error::TxService(format!("signing failed: {}", error)));
        }
        response
            .signature
            .ok_or_else(|| Error::TxService("service returned no signature".into()))
    }
}

#[async_trait]
impl WalletFactory for TxServiceClient {
    async fn generate(&self) -> Result<Wallet> {
        let response: WalletResponse = self.post("/wallets", &serde_json::json!({})).await?;
        let wallet = parse_wallet(response, None)?;
        debug!("Generated wallet {}", wallet.address);
        Ok(wallet)
    }

    async fn restore(&self, secret: &SecretKey) -> Result<Wallet> {
        let request = RestoreRequest {
            private_key: secret.expose(),
        };
        let response: WalletResponse = self.post("/wallets/restore", &request).await?;
        parse_wallet(response, Some(secret)).map_err(|e| match e {
            Error::WalletGeneration(msg) => Error::InvalidKey(msg),
            other => other,
        })
    }
}
