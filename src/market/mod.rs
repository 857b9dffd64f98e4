//! Steam market adapters
//!
//! Transports only move bytes; classification of responses lives in
//! [`fetcher`] and [`status`] so it can be tested without a network.

pub mod fetcher;
pub mod status;
pub mod steam;
pub mod types;

use crate::error::Result;
use async_trait::async_trait;

pub use fetcher::{FetchPolicy, FetchReport, PriceFetcher};
pub use status::{check_upstream, ServiceHealth};
pub use steam::SteamClient;
pub use types::{PriceQuote, RawResponse};

/// Price endpoint transport
#[async_trait]
pub trait MarketTransport: Send + Sync {
    /// One `priceoverview` request for the given market name
    async fn price_overview(&self, market_name: &str) -> Result<RawResponse>;
}

/// Upstream health endpoint transport
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn server_status(&self) -> Result<RawResponse>;
}
