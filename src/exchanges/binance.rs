use super::MarketData;
use crate::config::Config;
use crate::errors::ExchangeError;
use crate::models::{BookLevel, OrderBookSnapshot, SymbolList, SymbolSnapshot, parse_or_zero};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

const PING: &str = "ping";
const EXCHANGE_INFO: &str = "exchangeInfo";
const TICKER_24HR: &str = "ticker/24hr";
const DEPTH: &str = "depth";

/// The raw JSON shape of a depth snapshot. Levels are `[price, qty]` strings.
#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

/// Error body Binance sends with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl From<DepthResponse> for OrderBookSnapshot {
    fn from(raw: DepthResponse) -> Self {
        let levels = |side: Vec<[String; 2]>| -> Vec<BookLevel> {
            side.into_iter()
                .map(|[price, qty]| BookLevel {
                    price: parse_or_zero(&price),
                    quantity: parse_or_zero(&qty),
                })
                .collect()
        };

        Self {
            bids: levels(raw.bids),
            asks: levels(raw.asks),
        }
    }
}

pub struct Binance {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl Binance {
    pub fn new(base_url: &str, api_version: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.trim_matches('/').to_string(),
        })
    }

    /// Probes the primary endpoint and then each alternate, keeping the
    /// first one that answers a ping.
    pub async fn connect(config: &Config) -> Result<Self, ExchangeError> {
        let endpoints = config.endpoints();
        let mut binance = Self::new(&config.base_url, &config.api_version, config.request_timeout)?;

        for endpoint in &endpoints {
            binance.base_url = endpoint.trim_end_matches('/').to_string();

            match binance.ping().await {
                Ok(()) => {
                    tracing::info!(endpoint = %binance.base_url, "connection established");
                    return Ok(binance);
                }
                Err(e) => tracing::error!(endpoint = %endpoint, error = %e, "unable to reach endpoint"),
            }
        }

        Err(ExchangeError::Unreachable(endpoints))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ExchangeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Binance reports rejected requests as {code, msg} with a 4xx status
        if !status.is_success() {
            let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => format!("{} (code {})", err.msg, err.code),
                Err(_) => body,
            };
            return Err(ExchangeError::UnexpectedData(format!("HTTP {status}: {detail}")));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn parse_url(raw: &str, params: &[(&str, &str)]) -> Result<Url, ExchangeError> {
        let parsed = if params.is_empty() {
            Url::parse(raw)
        } else {
            Url::parse_with_params(raw, params)
        };
        parsed.map_err(|e| ExchangeError::UnexpectedData(e.to_string()))
    }
}

#[async_trait]
impl MarketData for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn ping(&self) -> Result<(), ExchangeError> {
        let url = Self::parse_url(&self.url(PING), &[])?;
        self.get_json::<serde_json::Value>(url).await?;
        Ok(())
    }

    async fn fetch_exchange_symbols(&self) -> Result<SymbolList, ExchangeError> {
        let url = Self::parse_url(&self.url(EXCHANGE_INFO), &[])?;
        self.get_json(url).await
    }

    /// Hits the 24hr ticker endpoint with a JSON array of symbols.
    async fn fetch_symbol_stats(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, SymbolSnapshot>, ExchangeError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let symbols_param = serde_json::to_string(symbols)?;
        let url = Self::parse_url(&self.url(TICKER_24HR), &[("symbols", symbols_param.as_str())])?;
        let stats: Vec<SymbolSnapshot> = self.get_json(url).await?;

        Ok(stats.into_iter().map(|s| (s.name.clone(), s)).collect())
    }

    async fn fetch_order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot, ExchangeError> {
        let limit = depth.to_string();
        let url = Self::parse_url(&self.url(DEPTH), &[("symbol", symbol), ("limit", limit.as_str())])?;
        let raw: DepthResponse = self.get_json(url).await?;

        Ok(raw.into())
    }
}
