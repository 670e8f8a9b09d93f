//! Account and chain identifiers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A 20-byte account address, held as lowercase `0x` + 40 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    /// Parse and normalise an address.
    ///
    /// Requires the `0x` prefix followed by exactly 40 hex characters, in any
    /// case.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AppError::InvalidAddress(s.to_string()))?;

        if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AppError::InvalidAddress(s.to_string()));
        }

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// The normalised `0x`-prefixed address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 40 hex characters without the prefix.
    pub fn hex_body(&self) -> &str {
        &self.0[2..]
    }

    /// Shortened form for display, e.g. `0xabcdef...12345678`.
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..8], &self.0[self.0.len() - 8..])
    }
}

impl FromStr for Account {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Account {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the network a wallet is on, displayed as `0x`-hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(u64);

impl ChainId {
    /// Ethereum Mainnet.
    pub const MAINNET: ChainId = ChainId(1);

    /// Wrap a numeric chain ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Parse `0x`-hex (as returned by `eth_chainId`) or plain decimal.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|_| AppError::InvalidInput(format!("Invalid chain ID: {s}")))
    }
}

impl FromStr for ChainId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChainId {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ChainId> for String {
    fn from(chain_id: ChainId) -> Self {
        chain_id.to_string()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}
