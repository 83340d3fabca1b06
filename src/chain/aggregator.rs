//! Aggregator route API client
//!
//! Route discovery happens entirely on the aggregator. We only ask for
//! routes and keep them opaque so they can be handed to the builder as-is.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{check_status, RouteResolver};
use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use crate::types::{Amount, Asset, Route, RouteBundle};

/// Response code for a successful quote
const CODE_OK: i64 = 200;

/// Route search response
#[derive(Debug, Clone, Deserialize)]
struct FindRoutesResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<FindRoutesData>,
}

#[derive(Debug, Clone, Deserialize)]
struct FindRoutesData {
    amount_in: Amount,
    amount_out: Amount,
    #[serde(default)]
    routes: Vec<Route>,
}

/// Aggregator client
pub struct AggregatorClient {
    client: Client,
    config: AggregatorConfig,
}

impl AggregatorClient {
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build aggregator client: {}", e)))?;

        info!("Aggregator client initialized for {}", config.endpoint);

        Ok(Self { client, config })
    }

    fn routes_url(&self) -> String {
        format!("{}/find_routes", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl RouteResolver for AggregatorClient {
    async fn resolve_route(
        &self,
        from: &Asset,
        to: &Asset,
        amount: &Amount,
        by_amount_in: bool,
    ) -> Result<Option<RouteBundle>> {
        debug!("Finding routes {} -> {} for {}", from, to, amount);

        let response = self
            .client
            .get(self.routes_url())
            .query(&[
                ("from", from.to_string()),
                ("target", to.to_string()),
                ("amount", amount.to_string()),
                ("by_amount_in", by_amount_in.to_string()),
                ("depth", self.config.depth.to_string()),
            ])
            .send()
            .await?;

        let response = check_status(response, Error::Aggregator).await?;
        let body: FindRoutesResponse = response.json().await?;
        parse_find_routes(body)
    }
}

fn parse_find_routes(body: FindRoutesResponse) -> Result<Option<RouteBundle>> {
    if body.code != CODE_OK {
        // The aggregator answers "no liquidity"/"no route" with a non-200 code
        debug!("Aggregator returned code {}: {}", body.code, body.msg);
        return Ok(None);
    }

    Ok(body.data.map(|data| RouteBundle {
        routes: data.routes,
        amount_in: data.amount_in,
        amount_out: data.amount_out,
    }))
}
