//! Network resolver.
//!
//! Maps chain IDs to display names and static network configuration. Unknown
//! chains resolve to a synthesized descriptor instead of failing, so wallet
//! display never stops on an unfamiliar network.

use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{json, Value};

use crate::{ethereum::constants::NATIVE_DECIMALS, types::ChainId};

/// Native currency of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    /// Currency name (e.g., "Ether").
    pub name: String,
    /// Currency symbol (e.g., "ETH").
    pub symbol: String,
    /// Number of decimals.
    pub decimals: u8,
}

/// Static configuration of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    /// Short lookup key (e.g., "mainnet"). Empty for unknown chains.
    pub key: String,
    /// Chain ID.
    pub chain_id: ChainId,
    /// Display name.
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Block explorer base URL.
    pub block_explorer: String,
    /// Native currency.
    pub native_currency: NativeCurrency,
    /// Testnet faucet, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faucet: Option<String>,
}

impl NetworkDescriptor {
    /// Whether this descriptor came from the static table.
    pub fn is_known(&self) -> bool {
        !self.key.is_empty()
    }

    /// Explorer link for a transaction hash, when the network has an explorer.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.block_explorer.is_empty() {
            return None;
        }
        Some(format!("{}/tx/{tx_hash}", self.block_explorer))
    }

    /// Parameter object for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        let mut params = json!({
            "chainId": self.chain_id.to_string(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": [self.rpc_url],
        });
        if !self.block_explorer.is_empty() {
            params["blockExplorerUrls"] = json!([self.block_explorer]);
        }
        params
    }
}

fn network(
    key: &str,
    chain_id: u64,
    name: &str,
    rpc_url: &str,
    block_explorer: &str,
    currency: (&str, &str),
    faucet: Option<&str>,
) -> NetworkDescriptor {
    NetworkDescriptor {
        key: key.to_string(),
        chain_id: ChainId::new(chain_id),
        name: name.to_string(),
        rpc_url: rpc_url.to_string(),
        block_explorer: block_explorer.to_string(),
        native_currency: NativeCurrency {
            name: currency.0.to_string(),
            symbol: currency.1.to_string(),
            decimals: NATIVE_DECIMALS,
        },
        faucet: faucet.map(str::to_string),
    }
}

/// All networks with a static descriptor.
pub fn known_networks() -> &'static [NetworkDescriptor] {
    static NETWORKS: OnceLock<Vec<NetworkDescriptor>> = OnceLock::new();
    NETWORKS.get_or_init(|| {
        vec![
            network(
                "mainnet",
                1,
                "Ethereum Mainnet",
                "https://mainnet.infura.io/v3/YOUR_INFURA_KEY",
                "https://etherscan.io",
                ("Ether", "ETH"),
                None,
            ),
            network(
                "ropsten",
                3,
                "Ropsten Testnet",
                "https://ropsten.infura.io/v3/YOUR_INFURA_KEY",
                "https://ropsten.etherscan.io",
                ("Ropsten Ether", "ETH"),
                None,
            ),
            network(
                "rinkeby",
                4,
                "Rinkeby Testnet",
                "https://rinkeby.infura.io/v3/YOUR_INFURA_KEY",
                "https://rinkeby.etherscan.io",
                ("Rinkeby Ether", "ETH"),
                None,
            ),
            network(
                "goerli",
                5,
                "Goerli Testnet",
                "https://goerli.infura.io/v3/YOUR_INFURA_KEY",
                "https://goerli.etherscan.io",
                ("Goerli Ether", "ETH"),
                Some("https://goerlifaucet.com/"),
            ),
            network(
                "sepolia",
                11_155_111,
                "Sepolia Testnet",
                "https://sepolia.infura.io/v3/YOUR_INFURA_KEY",
                "https://sepolia.etherscan.io",
                ("Sepolia Ether", "ETH"),
                Some("https://sepoliafaucet.com/"),
            ),
            network(
                "polygon",
                137,
                "Polygon Mainnet",
                "https://polygon-mainnet.infura.io/v3/YOUR_INFURA_KEY",
                "https://polygonscan.com",
                ("MATIC", "MATIC"),
                None,
            ),
            network(
                "mumbai",
                80_001,
                "Polygon Mumbai",
                "https://polygon-mumbai.infura.io/v3/YOUR_INFURA_KEY",
                "https://mumbai.polygonscan.com",
                ("MATIC", "MATIC"),
                Some("https://faucet.polygon.technology/"),
            ),
        ]
    })
}

/// Describe a chain. Unknown chains get a descriptor named `Chain ID: <id>`.
pub fn describe(chain_id: ChainId) -> NetworkDescriptor {
    known_networks().iter().find(|n| n.chain_id == chain_id).cloned().unwrap_or_else(|| {
        NetworkDescriptor {
            key: String::new(),
            chain_id,
            name: format!("Chain ID: {chain_id}"),
            rpc_url: String::new(),
            block_explorer: String::new(),
            native_currency: NativeCurrency {
                name: "Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: NATIVE_DECIMALS,
            },
            faucet: None,
        }
    })
}

/// Look a network up by key (e.g., "sepolia"), case-insensitively.
pub fn by_key(key: &str) -> Option<&'static NetworkDescriptor> {
    known_networks().iter().find(|n| n.key.eq_ignore_ascii_case(key.trim()))
}
