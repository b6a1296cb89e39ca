//! Alpaca market data: latest trade price and market clock.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tradeguard_core::error::DataError;
use tradeguard_core::traits::MarketData;

/// Connection settings for the Alpaca REST APIs.
#[derive(Debug, Clone)]
pub struct AlpacaSettings {
    pub api_key: String,
    pub api_secret: String,
    pub paper: bool,
    pub data_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl AlpacaSettings {
    pub fn new(api_key: String, api_secret: String, paper: bool) -> Self {
        Self {
            api_key,
            api_secret,
            paper,
            data_url: "https://data.alpaca.markets".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Read credentials from the named environment variables.
    pub fn from_env(key_var: &str, secret_var: &str, paper: bool) -> Result<Self, DataError> {
        let api_key = std::env::var(key_var)
            .map_err(|_| DataError::Configuration(format!("{} not set", key_var)))?;
        let api_secret = std::env::var(secret_var)
            .map_err(|_| DataError::Configuration(format!("{} not set", secret_var)))?;
        Ok(Self::new(api_key, api_secret, paper))
    }

    pub fn base_url(&self) -> &str {
        if self.paper {
            "https://paper-api.alpaca.markets"
        } else {
            "https://api.alpaca.markets"
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: Option<LatestTrade>,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    is_open: bool,
}

/// Market data over the Alpaca REST API.
pub struct AlpacaMarketData {
    settings: AlpacaSettings,
    client: Client,
}

impl AlpacaMarketData {
    pub fn new(settings: AlpacaSettings) -> Result<Self, DataError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(&settings.api_key)
                .map_err(|e| DataError::Configuration(e.to_string()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(&settings.api_secret)
                .map_err(|e| DataError::Configuration(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        Ok(Self { settings, client })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, DataError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => return Err(DataError::RateLimited),
            status if !status.is_success() => {
                let text = resp.text().await.unwrap_or_default();
                return Err(DataError::ConnectionError(format!("{}: {}", status, text)));
            }
            _ => {}
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|e| DataError::ParseError(e.to_string()))
    }

    fn request_error(&self, e: reqwest::Error) -> DataError {
        if e.is_timeout() {
            DataError::Timeout(self.settings.timeout.as_millis() as u64)
        } else {
            DataError::ConnectionError(e.to_string())
        }
    }
}

fn trade_price(resp: LatestTradeResponse) -> Option<Decimal> {
    resp.trade
        .filter(|t| t.price.is_finite() && t.price > 0.0)
        .and_then(|t| Decimal::from_f64_retain(t.price))
        .map(|p| p.round_dp(4))
}

#[async_trait]
impl MarketData for AlpacaMarketData {
    async fn get_last_price(&self, ticker: &str) -> Result<Option<Decimal>, DataError> {
        let url = format!(
            "{}/v2/stocks/{}/trades/latest",
            self.settings.data_url,
            ticker.to_uppercase()
        );
        let resp: Option<LatestTradeResponse> = self.get_json(&url, &[("feed", "iex")]).await?;
        let price = resp.and_then(trade_price);
        debug!(ticker, price = ?price, "latest trade");
        Ok(price)
    }

    async fn is_market_open(&self) -> Result<bool, DataError> {
        let url = format!("{}/v2/clock", self.settings.base_url());
        let clock: Option<ClockResponse> = self.get_json(&url, &[]).await?;
        clock
            .map(|c| c.is_open)
            .ok_or_else(|| DataError::ParseError("clock endpoint returned no data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_price_parsing() {
        let resp: LatestTradeResponse =
            serde_json::from_str(r#"{"symbol":"AAPL","trade":{"t":"2024-01-02T15:00:00Z","p":187.255,"s":100}}"#)
                .unwrap();
        assert_eq!(trade_price(resp), Some(dec!(187.255)));

        let empty: LatestTradeResponse = serde_json::from_str(r#"{"symbol":"AAPL"}"#).unwrap();
        assert_eq!(trade_price(empty), None);

        let zero: LatestTradeResponse = serde_json::from_str(r#"{"trade":{"p":0.0}}"#).unwrap();
        assert_eq!(trade_price(zero), None);
    }

    #[test]
    fn test_clock_parsing() {
        let clock: ClockResponse = serde_json::from_str(
            r#"{"timestamp":"2024-01-02T15:00:00-05:00","is_open":true,"next_open":"x","next_close":"y"}"#,
        )
        .unwrap();
        assert!(clock.is_open);
    }

    #[test]
    fn test_settings_urls() {
        let settings = AlpacaSettings::new("key".into(), "secret".into(), true);
        assert_eq!(settings.base_url(), "https://paper-api.alpaca.markets");
        assert!(AlpacaMarketData::new(settings).is_ok());
    }
}
