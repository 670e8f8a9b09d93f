//! Ethereum network constants.
//!
//! Contains the aggregator's native-currency placeholder and the curated
//! ERC-20 token lists.

use crate::types::ChainId;

/// Address the aggregator uses to denote the native currency.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Decimals of ETH and of every EVM native currency we list.
pub const NATIVE_DECIMALS: u8 = 18;

/// Gas limit for a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// A well-known ERC-20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenListEntry {
    /// Token symbol.
    pub symbol: &'static str,
    /// Token contract address.
    pub address: &'static str,
    /// Number of decimals.
    pub decimals: u8,
}

const fn token(symbol: &'static str, address: &'static str, decimals: u8) -> TokenListEntry {
    TokenListEntry { symbol, address, decimals }
}

// ============================================================================
// Token Lists
// ============================================================================

/// Popular tokens on Ethereum Mainnet.
pub const MAINNET_TOKENS: &[TokenListEntry] = &[
    token("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
    token("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
    token("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
    token("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
    token("UNI", "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984", 18),
];

/// Popular tokens on the Goerli testnet.
pub const GOERLI_TOKENS: &[TokenListEntry] = &[
    token("USDT", "0x509Ee0d083DdF8AC028f2a56731412edD63223B9", 6),
    token("USDC", "0x07865c6E87B9F70255377e024ace6630C1Eaa37F", 6),
    token("DAI", "0x73967c6a0904aA032C103b4104747E88c566B1A2", 18),
    token("WETH", "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6", 18),
];

/// Curated tokens for a chain; empty for chains without a list.
pub fn token_list(chain_id: ChainId) -> &'static [TokenListEntry] {
    match chain_id.as_u64() {
        1 => MAINNET_TOKENS,
        5 => GOERLI_TOKENS,
        _ => &[],
    }
}

/// Find a listed token by symbol (case-insensitive).
pub fn find_token(chain_id: ChainId, symbol: &str) -> Option<TokenListEntry> {
    token_list(chain_id).iter().copied().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}
