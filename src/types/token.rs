//! Token-related types and base-unit conversions.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::Account;

/// Information about a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token contract address (None for the native currency).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Token symbol (e.g., "ETH", "USDC").
    pub symbol: String,
    /// Number of decimals.
    pub decimals: u8,
}

impl TokenInfo {
    /// Create a TokenInfo for a chain's native currency.
    pub fn native(symbol: impl Into<String>, decimals: u8) -> Self {
        Self { address: None, symbol: symbol.into(), decimals }
    }

    /// Create a TokenInfo for an ERC20 token.
    pub fn erc20(address: &Account, symbol: impl Into<String>, decimals: u8) -> Self {
        Self { address: Some(address.to_string()), symbol: symbol.into(), decimals }
    }
}

/// Balance information response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Wallet address.
    pub address: String,
    /// Chain the balance was read from.
    pub chain_id: String,
    /// Display name of that chain.
    pub network: String,
    /// Token information.
    pub token: TokenInfo,
    /// Human-readable balance with proper decimals.
    pub balance: String,
    /// Raw balance in smallest unit.
    pub balance_raw: String,
}

/// USD reference price for a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Token contract address (lowercase).
    pub token: String,
    /// Price in US dollars.
    pub price_usd: String,
    /// Unix timestamp the price was fetched at.
    pub timestamp: u64,
}

/// A user-entered decimal amount together with the token's decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    amount: String,
    decimals: u8,
}

impl TokenAmount {
    /// Create an amount. The string is validated when converted.
    pub fn new(amount: impl Into<String>, decimals: u8) -> Self {
        Self { amount: amount.into().trim().to_string(), decimals }
    }

    /// Amount of the 18-decimal native currency.
    pub fn native(amount: impl Into<String>) -> Self {
        Self::new(amount, 18)
    }

    /// The decimal string as entered (trimmed).
    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Token decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Exact base-unit value.
    pub fn base_units(&self) -> Result<U256> {
        decimal_to_base_units(&self.amount, self.decimals)
    }

    /// Base-unit value, rejecting zero.
    pub fn positive_base_units(&self) -> Result<U256> {
        let value = self.base_units()?;
        if value.is_zero() {
            return Err(AppError::InvalidInput("Amount must be greater than zero".into()));
        }
        Ok(value)
    }
}

/// `10^decimals`, or `InvalidInput` if it does not fit in 256 bits.
fn scale(decimals: u8) -> Result<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| AppError::InvalidInput(format!("Unsupported decimals: {decimals}")))
}

/// Format a U256 value with decimals to a human-readable string.
///
/// Trailing fractional zeros are trimmed; nothing is rounded.
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let value_str = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return value_str;
    }

    let len = value_str.len();
    if len <= decimals {
        // Value is less than 1, pad with zeros
        let zeros = decimals - len;
        let decimal_part = value_str.trim_end_matches('0');
        format!("0.{}{}", "0".repeat(zeros), decimal_part)
    } else {
        let (integer, decimal) = value_str.split_at(len - decimals);
        let decimal = decimal.trim_end_matches('0');
        if decimal.is_empty() {
            integer.to_string()
        } else {
            format!("{integer}.{decimal}")
        }
    }
}

/// Convert a decimal string to base units, exactly.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`. Fractional digits beyond
/// `decimals` are accepted only when they are zeros.
pub fn decimal_to_base_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();

    if amount.is_empty() {
        return Err(AppError::InvalidInput("Amount cannot be empty".into()));
    }

    if amount.starts_with('-') {
        return Err(AppError::InvalidInput("Amount cannot be negative".into()));
    }

    let (integer, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    if integer.is_empty() && fraction.is_empty() {
        return Err(AppError::InvalidInput(format!("Invalid amount: {amount}")));
    }
    if !integer.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AppError::InvalidInput(format!("Invalid amount: {amount}")));
    }

    let places = decimals as usize;
    let fraction = if fraction.len() > places {
        let (kept, dropped) = fraction.split_at(places);
        if dropped.bytes().any(|b| b != b'0') {
            return Err(AppError::InvalidInput(format!(
                "Amount has more than {decimals} decimal places: {amount}"
            )));
        }
        kept.to_string()
    } else {
        format!("{fraction:0<places$}")
    };

    let overflow = || AppError::InvalidInput(format!("Amount too large: {amount}"));

    let integer_value = if integer.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(integer, 10).map_err(|_| overflow())?
    };
    let fraction_value = if fraction.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&fraction, 10).map_err(|_| overflow())?
    };

    integer_value
        .checked_mul(scale(decimals)?)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(overflow)
}

/// Parse a base-unit integer given as `0x` hex or plain decimal digits.
///
/// Empty input (and a bare `0x`) is zero.
pub fn parse_base_units(value: &str) -> Result<U256> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some("") => return Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None if value.is_empty() => return Ok(U256::ZERO),
        None => U256::from_str_radix(value, 10),
    };
    parsed.map_err(|e| AppError::InvalidInput(format!("Invalid base-unit value '{value}': {e}")))
}

/// Convert a base-unit integer (hex or decimal string) to a decimal string.
pub fn base_units_to_decimal(value: &str, decimals: u8) -> Result<String> {
    Ok(format_units(parse_base_units(value)?, decimals))
}

/// Render a value as a minimal `0x` hex quantity.
pub fn to_hex_quantity(value: U256) -> String {
    format!("0x{value:x}")
}
