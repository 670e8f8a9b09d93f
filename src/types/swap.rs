//! Swap-related types.

use std::time::Instant;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::{format_units, Account, TokenInfo};

/// Destination token as described by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedToken {
    /// Token symbol.
    pub symbol: String,
    /// Number of decimals.
    pub decimals: u8,
}

/// A normalised aggregator quote.
#[derive(Debug, Clone)]
pub struct Quote {
    /// Token being sold.
    pub src: Account,
    /// Token being bought.
    pub dst: Account,
    /// Amount sold, in base units.
    pub sell_amount: U256,
    /// Amount received, in base units of the destination token.
    pub to_amount: U256,
    /// Gas estimate reported by the aggregator.
    pub estimated_gas: u64,
    /// Destination token descriptor.
    pub to_token: QuotedToken,
    /// Sequence number of the request that produced this quote.
    pub sequence: u64,
    /// When the quote was received.
    pub issued_at: Instant,
}

impl Quote {
    /// Serializable view for display.
    pub fn summary(&self, sell_token: &TokenInfo) -> QuoteSummary {
        QuoteSummary {
            sell_token: sell_token.clone(),
            sell_amount: format_units(self.sell_amount, sell_token.decimals),
            buy_token: TokenInfo::erc20(&self.dst, &self.to_token.symbol, self.to_token.decimals),
            buy_amount: format_units(self.to_amount, self.to_token.decimals),
            buy_amount_raw: self.to_amount.to_string(),
            estimated_gas: self.estimated_gas,
        }
    }
}

/// Quote as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSummary {
    /// Token being sold.
    pub sell_token: TokenInfo,
    /// Amount sold (human-readable).
    pub sell_amount: String,
    /// Token being bought.
    pub buy_token: TokenInfo,
    /// Expected amount received (human-readable).
    pub buy_amount: String,
    /// Expected amount received in base units.
    pub buy_amount_raw: String,
    /// Gas estimate.
    pub estimated_gas: u64,
}

/// Transaction ready for `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Sender.
    pub from: String,
    /// Target address.
    pub to: String,
    /// Calldata (hex encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Value in wei (hex quantity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Gas limit (hex quantity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

/// Result of a submitted transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    /// Transaction hash returned by the wallet.
    pub tx_hash: String,
    /// Block explorer link, when the network has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    /// The request that was submitted.
    pub transaction: TransactionRequest,
}
