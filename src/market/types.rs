//! Wire types of the market endpoints

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Raw HTTP outcome handed from a transport to the classifier
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// `priceoverview` response body
#[derive(Debug, Clone, Deserialize)]
pub struct PriceOverview {
    pub success: bool,
    #[serde(default)]
    pub lowest_price: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub median_price: Option<String>,
}

/// Server status response, only the fields we look at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerStatusResponse {
    #[serde(default)]
    pub result: ServerStatusResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerStatusResult {
    #[serde(default)]
    pub services: ServiceStatuses,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceStatuses {
    #[serde(rename = "SessionsLogon", default)]
    pub sessions_logon: String,
    #[serde(rename = "SteamCommunity", default)]
    pub steam_community: String,
}

/// One market quote per item and run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    #[serde(serialize_with = "serialize_money")]
    pub lowest_price: Money,
    pub volume: u64,
    pub has_listing: bool,
}

impl PriceQuote {
    pub fn listed(lowest_price: Money, volume: u64) -> Self {
        Self {
            lowest_price,
            volume,
            has_listing: true,
        }
    }

    /// No active listing: priced at zero so valuation needs no special case
    pub fn unlisted() -> Self {
        Self {
            lowest_price: Money::ZERO,
            volume: 0,
            has_listing: false,
        }
    }
}

fn serialize_money<S>(money: &Money, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(money.as_f64())
}
