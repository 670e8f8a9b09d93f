//! Gold token wallet library
//!
//! Wallet session and call-encoding core for the gold-backed token site,
//! served to UI consumers as a Model Context Protocol server.
//!
//! # Features
//!
//! - **Wallet Session**: one shared connect/disconnect state, following
//!   account changes reported by the wallet
//! - **Call Encoding**: hand-encoded ERC20 `balanceOf`/`transfer` call data
//!   and exact decimal/base-unit conversion
//! - **Networks**: display names and static configuration per chain ID
//! - **Swaps**: aggregator quotes and swap transactions, signed by the wallet
//!
//! # Example
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use goldtoken_wallet::{Config, GoldTokenServer, HttpWallet, ProviderAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let wallet = HttpWallet::new("http://127.0.0.1:1248", Duration::from_secs(1))?;
//!     let server = GoldTokenServer::new(&config, ProviderAdapter::new(Arc::new(wallet))).await?;
//!     // Run server...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ethereum;
pub mod mcp;
pub mod services;
pub mod types;

pub use config::Config;
pub use error::{AppError, Result};
pub use ethereum::{HostError, HostWallet, HttpWallet, ProviderAdapter, RpcRequest};
pub use mcp::GoldTokenServer;
pub use services::{SessionState, SwapClient, WalletSession, WalletSnapshot};
