//! Ethereum interaction module.
//!
//! Contains the wallet provider adapter, its host transports, the network
//! resolver and hand-encoded contract calls.

pub mod constants;
pub mod contracts;
pub mod host;
pub mod http_wallet;
pub mod networks;
pub mod provider;

pub use host::{HostError, HostWallet, ListenerRegistry, RpcRequest};
pub use http_wallet::HttpWallet;
pub use networks::{describe, NetworkDescriptor};
pub use provider::{ProviderAdapter, Subscription};
