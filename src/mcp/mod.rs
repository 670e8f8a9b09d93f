//! MCP server module.
//!
//! Contains the MCP server implementation with tool handlers.

pub mod server;

pub use server::GoldTokenServer;
pub use server::{
    BuyTokenInput, GetSwapQuoteInput, GetTokenBalanceInput, GetTokenPriceInput, ListTokensInput,
    SwitchNetworkInput, TransferEthInput, TransferTokenInput,
};
