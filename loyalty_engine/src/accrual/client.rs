use std::time::Duration;

use log::*;
use lp_common::Points;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::db_types::{OrderNumber, OrderStatus};

/// What the oracle had to say about one order.
///
/// Only failures that should abort the current reconciliation cycle travel on the `Err` arm of
/// [`AccrualClient::order_status`]; everything the cycle can act on locally is a variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// The oracle knows the order. The status may still be non-terminal (`Registered`/`Processing`), which is not an
    /// error; the order simply stays in the unresolved set. `accrual` is present once the order is `Processed`.
    Resolved { status: OrderStatus, accrual: Option<Points> },
    /// The oracle asked us to back off. The wait hint is mandatory and applies to the rest of the cycle, not just
    /// this one order.
    RateLimited { retry_after: Duration },
    /// The oracle has no record of the order yet. Benign; retry on the next cycle.
    Unknown,
}

/// The response body for a resolved order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    pub order: OrderNumber,
    pub status: OrderStatus,
    #[serde(default)]
    pub accrual: Option<Points>,
}

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize accrual client: {0}")]
    Initialization(String),
    #[error("Error sending request to the accrual oracle: {0}")]
    RequestError(String),
    #[error("Could not deserialize oracle response: {0}")]
    JsonError(String),
    #[error("The accrual oracle returned a server error: {0}")]
    UpstreamError(u16),
    #[error("The accrual oracle sent an unexpected status code: {0}")]
    UnexpectedStatus(u16),
    #[error("Rate-limited response did not carry a usable Retry-After header: {0}")]
    InvalidRetryAfter(String),
}

/// A client that can ask the accrual oracle about one order.
///
/// The trait exists so the reconciler can be exercised against a scripted oracle in tests; [`HttpAccrualClient`] is
/// the production implementation.
#[allow(async_fn_in_trait)]
pub trait AccrualClient: Clone {
    async fn order_status(&self, number: OrderNumber) -> Result<AccrualOutcome, AccrualApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    base_url: String,
    client: Client,
}

impl HttpAccrualClient {
    pub fn new(base_url: &str) -> Result<Self, AccrualApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, number: OrderNumber) -> String {
        format!("{}/api/orders/{number}", self.base_url)
    }
}

impl AccrualClient for HttpAccrualClient {
    async fn order_status(&self, number: OrderNumber) -> Result<AccrualOutcome, AccrualApiError> {
        let url = self.url(number);
        trace!("☎️ Querying oracle: {url}");
        let response =
            self.client.get(url).send().await.map_err(|e| AccrualApiError::RequestError(e.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                let info =
                    response.json::<OrderInfo>().await.map_err(|e| AccrualApiError::JsonError(e.to_string()))?;
                trace!("☎️ Order [{}] is {} at the oracle", info.order, info.status);
                Ok(AccrualOutcome::Resolved { status: info.status, accrual: info.accrual })
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let seconds = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .ok_or_else(|| AccrualApiError::InvalidRetryAfter(format!("order {number}")))?;
                debug!("☎️ Oracle rate limit hit. Backing off for {seconds}s");
                Ok(AccrualOutcome::RateLimited { retry_after: Duration::from_secs(seconds) })
            },
            StatusCode::NO_CONTENT => {
                trace!("☎️ Oracle has no record of order [{number}] yet");
                Ok(AccrualOutcome::Unknown)
            },
            status if status.is_server_error() => Err(AccrualApiError::UpstreamError(status.as_u16())),
            status => {
                error!("☎️ Unexpected oracle response {status} for order [{number}]");
                Err(AccrualApiError::UnexpectedStatus(status.as_u16()))
            },
        }
    }
}
