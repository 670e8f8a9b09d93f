//! Configuration management module.
//!
//! Handles loading configuration from environment variables.

use std::{env, str::FromStr, time::Duration};

use crate::error::AppError;

/// Default 1inch-compatible aggregator endpoint.
pub const DEFAULT_AGGREGATOR_URL: &str = "https://api.1inch.dev/swap/v5.2";

/// Default price reference endpoint.
pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Wallet JSON-RPC endpoint. `None` means no wallet provider is present.
    pub wallet_rpc_url: Option<String>,
    /// Aggregator base URL (without the chain segment).
    pub aggregator_url: String,
    /// Optional aggregator API key, sent as a bearer token.
    pub aggregator_api_key: Option<String>,
    /// Chain ID used in aggregator paths.
    pub aggregator_chain_id: u64,
    /// Price reference API base URL.
    pub price_api_url: String,
    /// How long a quote may be used to build a swap.
    pub quote_ttl: Duration,
    /// Slippage applied when a caller does not pass one, in basis points.
    pub default_slippage_bps: u32,
    /// Interval for polling `eth_accounts` on the HTTP wallet transport.
    pub account_poll_interval: Duration,
    /// Logging level (default: info).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallet_rpc_url: None,
            aggregator_url: DEFAULT_AGGREGATOR_URL.to_string(),
            aggregator_api_key: None,
            aggregator_chain_id: 1,
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            quote_ttl: Duration::from_secs(30),
            default_slippage_bps: 100,
            account_poll_interval: Duration::from_millis(1000),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `WALLET_RPC_URL`: wallet JSON-RPC endpoint (unset = no wallet)
    /// - `AGGREGATOR_API_URL`: aggregator base URL
    /// - `AGGREGATOR_API_KEY`: aggregator API key
    /// - `AGGREGATOR_CHAIN_ID`: chain ID for aggregator paths (default: 1)
    /// - `PRICE_API_URL`: price reference base URL
    /// - `QUOTE_TTL_SECS`: quote lifetime in seconds (default: 30)
    /// - `DEFAULT_SLIPPAGE_BPS`: default slippage in basis points (default: 100)
    /// - `ACCOUNT_POLL_INTERVAL_MS`: account polling interval (default: 1000)
    /// - `LOG_LEVEL`: logging level (default: info)
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let wallet_rpc_url = non_empty_var("WALLET_RPC_URL");
        let aggregator_url =
            non_empty_var("AGGREGATOR_API_URL").unwrap_or(defaults.aggregator_url);
        let aggregator_api_key = non_empty_var("AGGREGATOR_API_KEY");
        let aggregator_chain_id =
            parsed_var("AGGREGATOR_CHAIN_ID")?.unwrap_or(defaults.aggregator_chain_id);
        let price_api_url = non_empty_var("PRICE_API_URL").unwrap_or(defaults.price_api_url);
        let quote_ttl = parsed_var::<u64>("QUOTE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.quote_ttl);
        let default_slippage_bps =
            parsed_var("DEFAULT_SLIPPAGE_BPS")?.unwrap_or(defaults.default_slippage_bps);
        let account_poll_interval = parsed_var::<u64>("ACCOUNT_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.account_poll_interval);
        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        if account_poll_interval.is_zero() {
            return Err(AppError::Config("ACCOUNT_POLL_INTERVAL_MS must be positive".into()));
        }

        Ok(Self {
            wallet_rpc_url,
            aggregator_url,
            aggregator_api_key,
            aggregator_chain_id,
            price_api_url,
            quote_ttl,
            default_slippage_bps,
            account_poll_interval,
            log_level,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| AppError::Config(format!("Invalid {name} '{raw}': {e}")))
        })
        .transpose()
}
