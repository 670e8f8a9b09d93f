//! Error types and handling module.
//!
//! Defines all application-specific error types, their user-facing messages
//! and the conversion into MCP tool errors.

use rmcp::ErrorData as McpError;
use thiserror::Error;

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code for a chain the wallet does not know.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// JSON-RPC internal error code, used for malformed provider results.
pub const INTERNAL_RPC_CODE: i64 = -32603;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// No wallet provider is present.
    #[error("Wallet provider unavailable")]
    ProviderUnavailable,

    /// The user declined a wallet prompt.
    #[error("User rejected the request")]
    UserRejected,

    /// Invalid Ethereum address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Local validation failure on user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure talking to an HTTP API.
    #[error("Network error: {0}")]
    Network(String),

    /// The aggregator or price API returned an error or malformed data.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Error reported by the wallet while executing a request.
    #[error("Wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The quote is too old to build a transaction from.
    #[error("Quote expired")]
    QuoteExpired,

    /// The wallet does not know the requested chain.
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// The operation needs a connected account.
    #[error("No account connected")]
    NotConnected,

    /// A conflicting operation is already in flight.
    #[error("Operation already in progress: {0}")]
    Busy(String),

    /// The result arrived after a newer request or a session change.
    #[error("Request superseded: {0}")]
    Superseded(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AppError {
    /// Build an RPC error from a provider code and message, recognising the
    /// EIP-1193 codes that have a dedicated variant.
    pub fn from_provider(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            USER_REJECTED_CODE => AppError::UserRejected,
            UNRECOGNIZED_CHAIN_CODE => AppError::UnknownChain(message),
            _ => AppError::Rpc { code, message },
        }
    }

    /// Malformed result returned by the wallet.
    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::Rpc { code: INTERNAL_RPC_CODE, message: message.into() }
    }

    /// Message shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ProviderUnavailable => {
                "No wallet detected. Please install MetaMask or another Ethereum wallet to continue."
                    .to_string()
            }
            AppError::UserRejected => {
                "The request was rejected in your wallet. You can try again.".to_string()
            }
            AppError::InvalidAddress(addr) => {
                format!("'{addr}' is not a valid address. Please check it and try again.")
            }
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Network(_) => {
                "Could not reach the service. Check your connection and try again.".to_string()
            }
            AppError::Upstream(_) => {
                "The remote service returned an unusable response. No transaction was sent."
                    .to_string()
            }
            AppError::Rpc { message, .. } => format!("Wallet error: {message}"),
            AppError::QuoteExpired => "The quote has expired. Please get a new quote.".to_string(),
            AppError::UnknownChain(chain) => {
                format!("Network {chain} not found. Please add the network manually.")
            }
            AppError::NotConnected => "Please connect your wallet first.".to_string(),
            AppError::Busy(_) => {
                "Another request is still pending. Please finish it in your wallet.".to_string()
            }
            AppError::Superseded(_) => {
                "This result is out of date and was discarded. Please try again.".to_string()
            }
            AppError::Config(_) | AppError::Parse(_) => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        let message = err.user_message();
        match err {
            AppError::InvalidAddress(_)
            | AppError::InvalidInput(_)
            | AppError::Parse(_)
            | AppError::QuoteExpired => McpError::invalid_params(message, None),
            AppError::Config(_) => McpError::invalid_request(message, None),
            _ => McpError::internal_error(message, None),
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
