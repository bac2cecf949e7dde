//! REST quote provider
//!
//! Fetches a batch of quotes with a single `GET {base_url}/quotes?symbols=A,B,C`
//! call authenticated by an API key header. HTTP and transport failures are
//! mapped onto `ProviderError` so the governor can classify them.

use super::{ProviderError, Quote, QuoteProvider};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-API-KEY";

/// Configuration for the HTTP provider
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Name reported in status output
    pub name: String,
    /// Base URL of the quote service
    pub base_url: String,
    /// API key (required)
    pub api_key: Option<String>,
    /// Hard per-request timeout
    pub timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            name: "http".to_string(),
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Quote provider over HTTP/JSON
pub struct HttpQuoteProvider {
    config: HttpProviderConfig,
    api_key: String,
    client: Client,
}

impl HttpQuoteProvider {
    /// Create a provider; fails fast on missing credentials
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("missing API key".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn quotes_url(&self) -> String {
        format!("{}/quotes", self.config.base_url.trim_end_matches('/'))
    }

    /// Map a non-success status onto a provider error
    fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> ProviderError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
                retry_after_secs: retry_after,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Configuration(format!("{status}: {body}"))
            }
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ProviderError::Network(format!("{status}")),
            _ => ProviderError::Other(format!("{status}: {body}")),
        }
    }

    /// Map a transport error onto a provider error
    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.config.timeout.as_millis() as u64)
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else if e.is_connect() || e.is_request() {
            ProviderError::Network(e.to_string())
        } else {
            ProviderError::Other(e.to_string())
        }
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, ProviderError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.quotes_url();
        tracing::debug!(url = %url, count = symbols.len(), "Requesting quotes");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, retry_after, &body));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_quotes(&body)
    }
}

/// Response envelope from the quote service
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Vec<RawQuote>,
}

/// Raw quote from the quote service
#[derive(Debug, Deserialize)]
struct RawQuote {
    symbol: String,
    last: Decimal,
    #[serde(default)]
    bid: Decimal,
    #[serde(default)]
    ask: Decimal,
    #[serde(default)]
    volume: u64,
    /// Feed time in epoch milliseconds
    timestamp: i64,
}

/// Decode a response body into quotes keyed by symbol
fn parse_quotes(body: &str) -> Result<HashMap<String, Quote>, ProviderError> {
    let response: QuotesResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let received_at = Utc::now();
    let mut quotes = HashMap::with_capacity(response.quotes.len());
    for raw in response.quotes {
        let feed_ts = Utc
            .timestamp_millis_opt(raw.timestamp)
            .single()
            .ok_or_else(|| {
                ProviderError::Malformed(format!("bad timestamp for {}: {}", raw.symbol, raw.timestamp))
            })?;
        quotes.insert(
            raw.symbol.clone(),
            Quote {
                symbol: raw.symbol,
                last: raw.last,
                bid: raw.bid,
                ask: raw.ask,
                volume: raw.volume,
                feed_ts,
                received_at,
            },
        );
    }
    Ok(quotes)
}
