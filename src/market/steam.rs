//! Steam community market and server status client

use super::{MarketTransport, RawResponse, StatusSource};
use crate::error::{AppError, Result};
use crate::system;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const PRICE_URL: &str = "https://steamcommunity.com/market/priceoverview/";
const STATUS_URL: &str = "https://api.steampowered.com/ICSGOServers_730/GetGameServersStatus/v1/";

/// Counter-Strike app id on the market
pub const APP_ID: u32 = 730;
/// Steam currency code for EUR
pub const CURRENCY_EUR: u32 = 3;

const PRICE_TIMEOUT: Duration = Duration::from_secs(3);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Steam HTTP client
pub struct SteamClient {
    client: Client,
    api_key: String,
}

impl SteamClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(PRICE_TIMEOUT)
            .user_agent(system::user_agent())
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    /// Query parameters of a price lookup
    pub fn price_query(market_name: &str) -> Vec<(&'static str, String)> {
        vec![
            ("appid", APP_ID.to_string()),
            ("country", "EN".to_string()),
            ("currency", CURRENCY_EUR.to_string()),
            ("market_hash_name", market_name.trim().to_string()),
        ]
    }

    async fn read(request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok(RawResponse { status, body })
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Transport(format!("request timed out: {}", err))
    } else {
        AppError::Transport(err.to_string())
    }
}

#[async_trait]
impl MarketTransport for SteamClient {
    async fn price_overview(&self, market_name: &str) -> Result<RawResponse> {
        let request = self
            .client
            .get(PRICE_URL)
            .query(&Self::price_query(market_name));
        Self::read(request).await
    }
}

#[async_trait]
impl StatusSource for SteamClient {
    async fn server_status(&self) -> Result<RawResponse> {
        let request = self
            .client
            .get(STATUS_URL)
            .timeout(STATUS_TIMEOUT)
            .query(&[("key", self.api_key.as_str())]);
        Self::read(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_query_params() {
        let query = SteamClient::price_query(" AK-47 | Redline (Field-Tested) ");
        assert_eq!(query[0], ("appid", "730".to_string()));
        assert_eq!(query[1], ("country", "EN".to_string()));
        assert_eq!(query[2], ("currency", "3".to_string()));
        assert_eq!(
            query[3],
            ("market_hash_name", "AK-47 | Redline (Field-Tested)".to_string())
        );
    }

    #[test]
    fn test_client_builds() {
        assert!(SteamClient::new("key").is_ok());
    }
}
