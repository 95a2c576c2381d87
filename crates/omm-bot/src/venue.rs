//! Venue REST client.
//!
//! Implements the gateway traits over the venue's HTTP API: atomic
//! order batches, open-order and position queries, and the depth
//! snapshot used by the book synchronizer.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use omm_core::{
    ActionOutcome, BookSnapshot, BookSnapshotClient, ExchangeGateway, GatewayError, OrderAction,
    OrderSide, Price, RestingOrder, Size,
};

use crate::config::VenueConfig;
use crate::error::AppResult;

const API_KEY_HEADER: &str = "X-API-KEY";

pub struct VenueRestClient {
    http: Client,
    base_url: String,
    symbol: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireAction<'a> {
    Place {
        side: OrderSide,
        price: &'a Price,
        size: &'a Size,
        post_only: bool,
    },
    Cancel {
        oid: u64,
    },
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    symbol: &'a str,
    atomic: bool,
    actions: Vec<WireAction<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    results: Vec<WireOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WireOutcome {
    Placed { oid: u64 },
    Cancelled,
    Rejected { reason: String },
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    oid: u64,
    side: OrderSide,
    price: Price,
    size: Size,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    position: Decimal,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<(Price, Size)>,
    asks: Vec<(Price, Size)>,
}

impl VenueRestClient {
    pub fn new(config: &VenueConfig, symbol: String) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            symbol,
            api_key: config.resolved_api_key(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("symbol", self.symbol.as_str())]);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .get(path)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }
}

impl ExchangeGateway for VenueRestClient {
    async fn submit_atomic_batch(
        &self,
        actions: &[OrderAction],
    ) -> Result<Vec<ActionOutcome>, GatewayError> {
        let wire_actions = actions
            .iter()
            .map(|action| match action {
                OrderAction::Place { side, price, size } => WireAction::Place {
                    side: *side,
                    price,
                    size,
                    post_only: true,
                },
                OrderAction::Cancel { oid } => WireAction::Cancel { oid: *oid },
            })
            .collect();
        let body = BatchRequest {
            symbol: &self.symbol,
            atomic: true,
            actions: wire_actions,
        };

        let mut builder = self
            .http
            .post(format!("{}/api/v1/batch", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "batch returned {}",
                response.status()
            )));
        }
        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|outcome| match outcome {
                WireOutcome::Placed { oid } => ActionOutcome::Placed { oid },
                WireOutcome::Cancelled => ActionOutcome::Cancelled,
                WireOutcome::Rejected { reason } => ActionOutcome::Rejected { reason },
            })
            .collect())
    }

    async fn fetch_resting_orders(&self) -> Result<Vec<RestingOrder>, GatewayError> {
        let orders: Vec<WireOrder> = self.fetch("/api/v1/openOrders").await?;
        Ok(orders
            .into_iter()
            .map(|o| RestingOrder {
                oid: o.oid,
                side: o.side,
                price: o.price,
                size: o.size,
                provisional: false,
            })
            .collect())
    }

    async fn fetch_position(&self) -> Result<Decimal, GatewayError> {
        let response: PositionResponse = self.fetch("/api/v1/position").await?;
        Ok(response.position)
    }
}

impl BookSnapshotClient for VenueRestClient {
    async fn fetch_snapshot(&self) -> Result<BookSnapshot, GatewayError> {
        let depth: DepthResponse = self.fetch("/api/v1/depth").await?;
        Ok(BookSnapshot {
            seq: depth.last_update_id,
            bids: depth.bids,
            asks: depth.asks,
        })
    }
}
