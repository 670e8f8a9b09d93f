//! Price query service.
//!
//! USD reference prices from a CoinGecko-compatible API. A token the API does
//! not know has no price; that is not an error.

use std::time::{Duration, SystemTime};

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::Config,
    error::{AppError, Result},
    types::{Account, PriceInfo},
};

/// Get current Unix timestamp in seconds.
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Service for fetching token prices.
#[derive(Clone)]
pub struct PriceService {
    http: reqwest::Client,
    base_url: String,
}

impl PriceService {
    /// Create a new price service.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, base_url: config.price_api_url.trim_end_matches('/').to_string() })
    }

    /// USD price of an Ethereum mainnet token, or `None` if it is not listed.
    pub async fn token_price(&self, token: &Account) -> Result<Option<PriceInfo>> {
        tracing::debug!(token = %token, "Fetching token price");

        let url = format!("{}/simple/token_price/ethereum", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("contract_addresses", token.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, token = %token, "Price API returned an error");
            return Err(AppError::Upstream(format!("Price API returned {status}")));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Price API returned an invalid body: {e}"))
        })?;

        let price = parse_price_response(&body, token)?;
        Ok(price.map(|price| PriceInfo {
            token: token.to_string(),
            price_usd: price.normalize().to_string(),
            timestamp: current_timestamp(),
        }))
    }
}

/// Extract the USD price of `token` from a `simple/token_price` body.
fn parse_price_response(body: &Value, token: &Account) -> Result<Option<Decimal>> {
    let entries = body
        .as_object()
        .ok_or_else(|| AppError::Upstream("Price response is not an object".into()))?;

    let entry = entries
        .iter()
        .find(|(address, _)| address.eq_ignore_ascii_case(token.as_str()))
        .map(|(_, entry)| entry);

    let Some(usd) = entry.and_then(|e| e.get("usd")) else {
        return Ok(None);
    };

    match usd {
        Value::Number(n) => {
            let value = n
                .as_f64()
                .ok_or_else(|| AppError::Upstream(format!("Invalid price: {n}")))?;
            Decimal::try_from(value)
                .map(Some)
                .map_err(|e| AppError::Upstream(format!("Invalid price {n}: {e}")))
        }
        Value::Null => Ok(None),
        other => Err(AppError::Upstream(format!("Invalid price: {other}"))),
    }
}
